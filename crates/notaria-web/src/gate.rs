//! The permission gate as the handlers use it.

use notaria_core::access::{self, Action, Owned, denial_message};

use crate::AppError;
use crate::session::CurrentUser;

/// Hand `record` back when the user may perform `action` on it. Otherwise
/// flash the denial and redirect to `back_to`.
pub fn require<T: Owned>(me: &CurrentUser, record: T, action: Action, back_to: impl Into<String>) -> Result<T, AppError> {
    if access::allowed(&me.user, &record, action) {
        return Ok(record);
    }
    me.session.error(denial_message::<T>(action));
    Err(AppError::Denied {
        redirect_to: back_to.into(),
    })
}

/// Parse an optional numeric query parameter, ignoring junk.
pub fn query_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}
