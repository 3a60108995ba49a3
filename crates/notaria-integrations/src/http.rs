//! Bearer-key JSON client shared by the verification providers.

use std::time::Duration;

use notaria_core::settings::ProviderSettings;
use reqwest::Response;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::IntegrationError;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, IntegrationError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turn a non-2xx response into [`IntegrationError::Server`].
pub(crate) async fn success(resp: Response) -> Result<Response, IntegrationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(IntegrationError::Server {
        status: status.as_u16(),
        body,
    })
}

/// Providers return ids as strings or numbers.
pub(crate) fn id_field(value: &Value, field: &'static str) -> Result<String, IntegrationError> {
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(IntegrationError::MissingField(field)),
    }
}

pub(crate) struct KeyedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    service: &'static str,
}

impl KeyedClient {
    pub(crate) fn new(
        service: &'static str,
        settings: &ProviderSettings,
        timeout: Duration,
    ) -> Result<Self, IntegrationError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(IntegrationError::NotConfigured(service))?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            service,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, IntegrationError> {
        let url = self.url(path);
        info!(service = self.service, url = %url, "POST");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        Ok(success(resp).await?.json().await?)
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<Value, IntegrationError> {
        let url = self.url(path);
        info!(service = self.service, url = %url, "GET");
        let resp = self.client.get(&url).bearer_auth(&self.api_key).send().await?;
        Ok(success(resp).await?.json().await?)
    }

    /// Reachability probe: any response other than an auth rejection counts.
    pub(crate) async fn probe(&self, path: &str) -> Result<u16, IntegrationError> {
        let url = self.url(path);
        info!(service = self.service, url = %url, "probing");
        let resp = self.client.get(&url).bearer_auth(&self.api_key).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(IntegrationError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(id_field(&json!({"id": "a1"}), "id").unwrap(), "a1");
        assert_eq!(id_field(&json!({"id": 42}), "id").unwrap(), "42");
        assert!(matches!(
            id_field(&json!({"id": ""}), "id"),
            Err(IntegrationError::MissingField("id"))
        ));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let settings = ProviderSettings::new("https://api.credas.com/");
        assert!(matches!(
            KeyedClient::new("Credas", &settings, Duration::from_secs(1)),
            Err(IntegrationError::NotConfigured("Credas"))
        ));
    }
}
