//! Zoom meetings through a server-to-server OAuth app.

use std::time::Duration;

use chrono::NaiveDateTime;
use notaria_core::settings::ZoomSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::IntegrationError;
use crate::http::{build_client, id_field, success};

pub struct ZoomClient {
    client: reqwest::Client,
    base_url: String,
    oauth_base_url: String,
    api_key: String,
    api_secret: String,
    account_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeetingRequest {
    pub topic: String,
    /// UTC start; `None` creates an instant meeting.
    pub start_time: Option<NaiveDateTime>,
    pub duration_minutes: u32,
    pub agenda: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Meeting {
    pub id: String,
    pub join_url: String,
}

#[derive(Serialize)]
struct MeetingBody<'a> {
    topic: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    agenda: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ZoomClient {
    pub fn new(settings: &ZoomSettings, timeout: Duration) -> Result<Self, IntegrationError> {
        let missing = IntegrationError::NotConfigured("Zoom");
        let (Some(api_key), Some(api_secret), Some(account_id)) = (
            settings.api_key.clone(),
            settings.api_secret.clone(),
            settings.account_id.clone(),
        ) else {
            return Err(missing);
        };
        Ok(Self {
            client: build_client(timeout)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            oauth_base_url: settings.oauth_base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            account_id,
        })
    }

    /// Fetch a short-lived account token.
    async fn access_token(&self) -> Result<String, IntegrationError> {
        let url = format!("{}/oauth/token", self.oauth_base_url);
        info!(url = %url, "requesting zoom access token");
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&[("grant_type", "account_credentials"), ("account_id", self.account_id.as_str())])
            .send()
            .await?;
        let token: TokenResponse = success(resp).await?.json().await?;
        Ok(token.access_token)
    }

    pub async fn create_meeting(&self, request: &MeetingRequest) -> Result<Meeting, IntegrationError> {
        let token = self.access_token().await?;
        let body = MeetingBody {
            topic: &request.topic,
            kind: if request.start_time.is_some() { 2 } else { 1 },
            start_time: request
                .start_time
                .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            duration: request.duration_minutes,
            agenda: request.agenda.as_deref(),
        };
        let url = format!("{}/v2/users/me/meetings", self.base_url);
        info!(url = %url, topic = %request.topic, "creating zoom meeting");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let value: Value = success(resp).await?.json().await?;
        let meeting = Meeting {
            id: id_field(&value, "id")?,
            join_url: value
                .get("join_url")
                .and_then(Value::as_str)
                .ok_or(IntegrationError::MissingField("join_url"))?
                .to_string(),
        };
        info!(meeting_id = %meeting.id, "zoom meeting created");
        Ok(meeting)
    }

    /// Token exchange plus a `users/me` lookup.
    pub async fn test_connection(&self) -> Result<String, IntegrationError> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(format!("{}/v2/users/me", self.base_url))
            .bearer_auth(&token)
            .send()
            .await?;
        let me: Value = success(resp).await?.json().await?;
        let email = me.get("email").and_then(Value::as_str).unwrap_or("unknown user");
        Ok(format!("Zoom connection successful for {email}."))
    }
}
