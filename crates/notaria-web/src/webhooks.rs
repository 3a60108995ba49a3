//! Provider webhook receivers. These sit outside the session layer: no
//! cookies, no Origin check, JSON in and JSON out.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use notaria_core::compliance::{WebhookPayload, WebhookRejection};
use notaria_core::integration::LogLevel;
use notaria_core::{NewLogEntry, ServiceName};
use notaria_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/compliance/webhooks/credas/", post(credas).fallback(method_not_allowed))
        .route("/compliance/webhooks/peps-sanctions/", post(peps_sanctions).fallback(method_not_allowed))
        .route("/integrations/webhooks/credas/", post(credas).fallback(method_not_allowed))
        .route("/integrations/webhooks/peps-sanctions/", post(peps_sanctions).fallback(method_not_allowed))
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("{}", .0.message())]
    Rejected(WebhookRejection),

    #[error("Unknown check ID")]
    UnknownCheck,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::UnknownCheck => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for WebhookError {
    fn from(err: AppError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StoreError> for WebhookError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "webhook processing failed");
        }
        (status, Json(json!({"status": "error", "message": self.to_string()}))).into_response()
    }
}

async fn method_not_allowed() -> WebhookError {
    WebhookError::MethodNotAllowed
}

async fn credas(State(app): State<AppState>, body: Bytes) -> Result<Response, WebhookError> {
    receive(&app, ServiceName::Credas, &body)
}

async fn peps_sanctions(State(app): State<AppState>, body: Bytes) -> Result<Response, WebhookError> {
    receive(&app, ServiceName::PepsSanctions, &body)
}

/// Store a provider result on the check it refers to.
fn receive(app: &AppState, service: ServiceName, body: &[u8]) -> Result<Response, WebhookError> {
    let payload = WebhookPayload::parse(body).map_err(|rejection| {
        warn!(service = %service, reason = rejection.message(), "webhook rejected");
        WebhookError::Rejected(rejection)
    })?;
    let store = app.db()?;
    let Some(check) = store.check_by_reference(service, &payload.check_id)? else {
        warn!(service = %service, reference = %payload.check_id, "webhook for unknown check");
        return Err(WebhookError::UnknownCheck);
    };
    let updated = store.record_provider_result(check.id, service, &payload.result, payload.outcome())?;

    let integration_id = store.integration_for(service)?.map(|row| row.id);
    let message = format!(
        "Webhook received for check {} (provider status {}); check is now {}",
        check.id,
        payload.status.as_deref().unwrap_or("unknown"),
        updated.status
    );
    store.log_integration_event(
        &NewLogEntry::new(LogLevel::Info, message)
            .for_integration(integration_id)
            .about("ComplianceCheck", check.id),
    )?;
    info!(service = %service, check_id = check.id, status = %updated.status, "webhook processed");
    Ok(Json(json!({"status": "success", "message": "Webhook received and processed"})).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use notaria_core::{CheckInput, ComplianceStatus};
    use serde_json::Value;

    fn submitted_check(app: &TestApp, service: ServiceName, reference: &str) -> i64 {
        let mut store = app.state.db().unwrap();
        let check = store.initiate_check(&CheckInput::default(), None).unwrap();
        store
            .record_provider_reference(check.id, service, reference, ComplianceStatus::InProgress)
            .unwrap();
        check.id
    }

    async fn post(app: &TestApp, path: &str, body: &str) -> (u16, Value) {
        let resp = app.anonymous().post_body(path, "application/json", body).await;
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn completed_result_moves_check_to_review() {
        let app = TestApp::spawn().await;
        let id = submitted_check(&app, ServiceName::Credas, "CR-1");
        let (status, body) = post(
            &app,
            "/compliance/webhooks/credas/",
            r#"{"check_id": "CR-1", "status": "completed", "result": {"score": 97}}"#,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Webhook received and processed");

        let check = app.state.db().unwrap().get_check(id).unwrap();
        assert_eq!(check.status, ComplianceStatus::RequiresReview);
        assert_eq!(check.credas_result, Some(json!({"score": 97})));
        let logs = app.state.db().unwrap().recent_logs(5).unwrap();
        assert_eq!(logs[0].related_object_id.as_deref(), Some(id.to_string().as_str()));
    }

    #[tokio::test]
    async fn sanctions_failure_on_integrations_path() {
        let app = TestApp::spawn().await;
        let id = submitted_check(&app, ServiceName::PepsSanctions, "S-7");
        let (status, _) = post(
            &app,
            "/integrations/webhooks/peps-sanctions/",
            r#"{"check_id": "S-7", "status": "failed", "result": {"hits": 2}}"#,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(app.state.db().unwrap().get_check(id).unwrap().status, ComplianceStatus::Failed);
    }

    #[tokio::test]
    async fn other_statuses_only_store_result() {
        let app = TestApp::spawn().await;
        let id = submitted_check(&app, ServiceName::Credas, "CR-2");
        post(&app, "/compliance/webhooks/credas/", r#"{"check_id": "CR-2", "status": "processing", "result": {}}"#).await;
        let check = app.state.db().unwrap().get_check(id).unwrap();
        assert_eq!(check.status, ComplianceStatus::InProgress);
        assert_eq!(check.credas_result, Some(json!({})));
    }

    #[tokio::test]
    async fn rejections() {
        let app = TestApp::spawn().await;
        submitted_check(&app, ServiceName::Credas, "CR-3");
        let path = "/compliance/webhooks/credas/";

        let (status, body) = post(&app, path, "not json").await;
        assert_eq!((status, body["message"].as_str()), (400, Some("Invalid JSON payload")));
        let (status, body) = post(&app, path, r#"{"status": "completed"}"#).await;
        assert_eq!((status, body["message"].as_str()), (400, Some("Missing check_id")));
        let (status, body) = post(&app, path, r#"{"check_id": "nope"}"#).await;
        assert_eq!((status, body["message"].as_str()), (404, Some("Unknown check ID")));
        // A Credas reference means nothing to the sanctions receiver.
        let (status, _) = post(&app, "/compliance/webhooks/peps-sanctions/", r#"{"check_id": "CR-3"}"#).await;
        assert_eq!(status, 404);

        let resp = app.anonymous().request_raw(reqwest::Method::GET, path).await;
        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn internal_errors_map_to_500() {
        let err = WebhookError::from(AppError::Poisoned);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
