use async_trait::async_trait;
use axum::extract::{Form, FromRequest, Request};
use axum::response::{IntoResponse, Response};
use notaria_core::{FormData, FormErrors};

use crate::session::SessionHandle;

/// A url-encoded form body as [`FormData`], keeping repeated fields.
pub struct Posted(pub FormData);

#[async_trait]
impl<S> FromRequest<S> for Posted
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(FormData::from_pairs(pairs)))
    }
}

/// One error flash per field message.
pub fn flash_errors(session: &SessionHandle, errors: &FormErrors) {
    for message in errors.messages() {
        session.error(message);
    }
}
