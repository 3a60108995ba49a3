//! PEPs and sanctions screening.

use std::time::Duration;

use notaria_core::settings::ProviderSettings;
use serde_json::{Value, json};
use tracing::info;

use crate::http::{KeyedClient, id_field};
use crate::{IntegrationError, Subject};

pub struct SanctionsClient {
    inner: KeyedClient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screening {
    pub reference: String,
    pub match_found: bool,
}

impl SanctionsClient {
    pub fn new(settings: &ProviderSettings, timeout: Duration) -> Result<Self, IntegrationError> {
        Ok(Self {
            inner: KeyedClient::new("PEPs & Sanctions", settings, timeout)?,
        })
    }

    /// Start a screening search for a client.
    pub async fn search(&self, subject: &Subject) -> Result<Screening, IntegrationError> {
        let body = json!({
            "client_id": subject.client_id,
            "name": subject.name,
            "date_of_birth": subject.date_of_birth.map(|d| d.to_string()),
        });
        let resp = self.inner.post_json("/v1/search", &body).await?;
        let screening = Screening {
            reference: id_field(&resp, "search_id")?,
            match_found: resp.get("match_found").and_then(Value::as_bool).unwrap_or(false),
        };
        info!(reference = %screening.reference, match_found = screening.match_found, "sanctions search submitted");
        Ok(screening)
    }

    pub async fn search_result(&self, reference: &str) -> Result<Value, IntegrationError> {
        self.inner.get_json(&format!("/v1/search/{reference}")).await
    }

    pub async fn test_connection(&self) -> Result<String, IntegrationError> {
        let status = self.inner.probe("/v1/search").await?;
        Ok(format!("PEPs/Sanctions API reachable (HTTP {status})."))
    }
}
