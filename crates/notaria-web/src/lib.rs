//! Server-rendered web application: page routes behind the session layer,
//! webhook receivers outside it.

mod error;
pub use error::AppError;

mod state;
pub use state::AppState;

pub mod render;
pub mod session;

mod forms;
mod gate;
mod outbound;

mod accounts;
mod clients;
mod compliance;
mod dashboard;
mod documents;
mod integrations;
mod matters;
mod webhooks;

#[cfg(test)]
mod testing;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tracing::info;

async fn not_found() -> Response {
    let body = "<p>The requested page was not found.</p><p><a href=\"/dashboard/\">Back to the dashboard</a></p>";
    (
        StatusCode::NOT_FOUND,
        render::page("Not Found", None, &[], body),
    )
        .into_response()
}

/// The whole application.
pub fn router(state: AppState) -> Router {
    let pages = Router::new()
        .merge(dashboard::routes())
        .merge(accounts::routes())
        .merge(clients::routes())
        .merge(matters::routes())
        .merge(compliance::routes())
        .merge(documents::routes())
        .merge(integrations::routes())
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), session::session_layer));
    Router::new()
        .merge(webhooks::routes())
        .merge(pages)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state)).await
}
