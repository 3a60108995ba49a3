//! Credas identity verification.

use std::time::Duration;

use notaria_core::settings::ProviderSettings;
use serde_json::{Value, json};
use tracing::info;

use crate::http::{KeyedClient, id_field};
use crate::{IntegrationError, Subject};

pub struct CredasClient {
    inner: KeyedClient,
}

/// A check accepted by Credas.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub reference: String,
    pub status: Option<String>,
}

impl CredasClient {
    pub fn new(settings: &ProviderSettings, timeout: Duration) -> Result<Self, IntegrationError> {
        Ok(Self {
            inner: KeyedClient::new("Credas", settings, timeout)?,
        })
    }

    /// Submit a client for identity verification.
    pub async fn submit_check(&self, subject: &Subject) -> Result<Submission, IntegrationError> {
        let body = json!({
            "client_id": subject.client_id,
            "first_name": subject.first_name,
            "last_name": subject.last_name,
            "date_of_birth": subject.date_of_birth.map(|d| d.to_string()),
        });
        let resp = self.inner.post_json("/v1/checks", &body).await?;
        let submission = Submission {
            reference: id_field(&resp, "check_id")?,
            status: resp.get("status").and_then(Value::as_str).map(str::to_string),
        };
        info!(reference = %submission.reference, status = ?submission.status, "credas check submitted");
        Ok(submission)
    }

    pub async fn check_result(&self, reference: &str) -> Result<Value, IntegrationError> {
        self.inner.get_json(&format!("/v1/checks/{reference}")).await
    }

    pub async fn test_connection(&self) -> Result<String, IntegrationError> {
        let status = self.inner.probe("/v1/checks").await?;
        Ok(format!("Credas API reachable (HTTP {status})."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake;
    use chrono::NaiveDate;

    fn subject() -> Subject {
        Subject {
            client_id: 7,
            first_name: Some("Ann".into()),
            last_name: Some("Smith".into()),
            name: "Ann Smith".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 1),
        }
    }

    fn settings(base: &str) -> ProviderSettings {
        ProviderSettings {
            api_key: Some("ck".into()),
            api_secret: None,
            base_url: base.into(),
        }
    }

    #[tokio::test]
    async fn submit_sends_bearer_and_reads_reference() {
        let (base, log) = fake(|_, _| (201, json!({"check_id": "cr-9", "status": "pending"}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        let sub = client.submit_check(&subject()).await.unwrap();
        assert_eq!(sub.reference, "cr-9");
        assert_eq!(sub.status.as_deref(), Some("pending"));

        let req = log.lock().unwrap()[0].clone();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v1/checks");
        assert_eq!(req.authorization.as_deref(), Some("Bearer ck"));
        assert_eq!(req.json()["date_of_birth"], "1980-05-01");
        assert_eq!(req.json()["client_id"], 7);
    }

    #[tokio::test]
    async fn result_is_fetched_by_reference() {
        let (base, log) = fake(|_, _| (200, json!({"outcome": "clear"}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        assert_eq!(client.check_result("cr-9").await.unwrap()["outcome"], "clear");
        assert_eq!(log.lock().unwrap()[0].path, "/v1/checks/cr-9");
    }

    #[tokio::test]
    async fn provider_errors_surface() {
        let (base, _) = fake(|_, _| (422, json!({"error": "bad dob"}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        let err = client.submit_check(&subject()).await.unwrap_err();
        assert!(matches!(err, IntegrationError::Server { status: 422, .. }));

        let (base, _) = fake(|_, _| (200, json!({"status": "pending"}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.submit_check(&subject()).await,
            Err(IntegrationError::MissingField("check_id"))
        ));
    }

    #[tokio::test]
    async fn connection_test_rejects_bad_key() {
        let (base, _) = fake(|_, _| (401, json!({"error": "unauthorized"}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        assert!(client.test_connection().await.is_err());

        let (base, _) = fake(|_, _| (405, json!({}))).await;
        let client = CredasClient::new(&settings(&base), Duration::from_secs(5)).unwrap();
        assert!(client.test_connection().await.unwrap().contains("405"));
    }
}
