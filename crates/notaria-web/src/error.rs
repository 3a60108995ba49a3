use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use notaria_ai::AiError;
use notaria_integrations::IntegrationError;
use notaria_store::StoreError;
use thiserror::Error;
use tracing::error;

use crate::render;

/// Failures that end a request without a redirect.
///
/// Expected failures (validation, permissions, provider errors) are turned
/// into flash messages by the handlers; what reaches this type renders an
/// error page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("{0}")]
    BadRequest(String),

    /// The permission gate refused; the flash message is already queued.
    #[error("permission denied")]
    Denied { redirect_to: String },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Denied { .. } => StatusCode::SEE_OTHER,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Denied { redirect_to } = &self {
            return render::redirect(redirect_to);
        }
        let status = self.status_code();
        let message = match status {
            StatusCode::NOT_FOUND => "The requested page was not found.".to_string(),
            StatusCode::BAD_REQUEST => self.to_string(),
            _ => {
                error!(error = %self, "request failed");
                "Something went wrong on our side. The error has been logged.".to_string()
            }
        };
        let title = status.canonical_reason().unwrap_or("Error");
        let body = format!("<p>{}</p><p><a href=\"/dashboard/\">Back to the dashboard</a></p>", render::escape(&message));
        (status, render::page(title, None, &[], &body)).into_response()
    }
}
