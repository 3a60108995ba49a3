//! Gmail over Google OAuth2: consent URL, code exchange, token refresh,
//! sending mail and the profile lookup used as a connection test.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use chrono::{Duration as TimeDelta, NaiveDateTime};
use notaria_core::settings::GoogleSettings;
use notaria_core::{Integration, OAuthTokens};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use url::Url;

use crate::IntegrationError;
use crate::http::{build_client, success};

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub struct GmailClient {
    client: reqwest::Client,
    settings: GoogleSettings,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn resolve(self, now: NaiveDateTime) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + TimeDelta::seconds(secs)),
            scope: self.scope,
        }
    }
}

/// A usable access token, plus the refreshed tokens to persist when a
/// refresh was needed.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub refreshed: Option<OAuthTokens>,
}

impl GmailClient {
    pub fn new(settings: &GoogleSettings, timeout: Duration) -> Result<Self, IntegrationError> {
        let (Some(client_id), Some(client_secret)) =
            (settings.client_id.clone(), settings.client_secret.clone())
        else {
            return Err(IntegrationError::NotConfigured("Gmail"));
        };
        Ok(Self {
            client: build_client(timeout)?,
            settings: settings.clone(),
            client_id,
            client_secret,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_base_url.trim_end_matches('/'))
    }

    // ── OAuth ──

    /// Consent screen URL. `access_type=offline` asks for a refresh token.
    pub fn authorization_url(&self, state: &str) -> Result<String, IntegrationError> {
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn token_request(&self, form: &[(&str, &str)], now: NaiveDateTime) -> Result<OAuthTokens, IntegrationError> {
        info!(url = %self.settings.token_url, "google token request");
        let resp = self.client.post(&self.settings.token_url).form(form).send().await?;
        let tokens: TokenResponse = success(resp).await?.json().await?;
        Ok(tokens.resolve(now))
    }

    /// Exchange the callback's authorisation code for tokens.
    pub async fn exchange_code(&self, code: &str, now: NaiveDateTime) -> Result<OAuthTokens, IntegrationError> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ],
            now,
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str, now: NaiveDateTime) -> Result<OAuthTokens, IntegrationError> {
        let mut tokens = self
            .token_request(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
                now,
            )
            .await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    /// The stored access token, refreshed first when it is about to expire.
    pub async fn access_token(&self, integration: &Integration, now: NaiveDateTime) -> Result<AccessToken, IntegrationError> {
        if let Some(token) = &integration.google_access_token
            && !integration.google_token_expired(now)
        {
            return Ok(AccessToken {
                token: token.clone(),
                refreshed: None,
            });
        }
        let Some(refresh_token) = &integration.google_refresh_token else {
            warn!(integration_id = integration.id, "google token expired and no refresh token stored");
            return Err(IntegrationError::NotConfigured("Gmail"));
        };
        let tokens = self.refresh(refresh_token, now).await?;
        info!(integration_id = integration.id, "refreshed google access token");
        Ok(AccessToken {
            token: tokens.access_token.clone(),
            refreshed: Some(tokens),
        })
    }

    // ── Gmail API ──

    /// Send an HTML email from the linked account; returns the message id.
    pub async fn send(
        &self,
        access_token: &str,
        to: &[String],
        subject: &str,
        body_html: &str,
    ) -> Result<String, IntegrationError> {
        let raw = URL_SAFE.encode(mime_message(to, subject, body_html));
        let url = self.api_url("/gmail/v1/users/me/messages/send");
        info!(url = %url, recipients = to.len(), "sending gmail message");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;
        let sent: Value = success(resp).await?.json().await?;
        let id = sent
            .get("id")
            .and_then(Value::as_str)
            .ok_or(IntegrationError::MissingField("id"))?;
        info!(message_id = %id, "gmail message sent");
        Ok(id.to_string())
    }

    /// Email address of the linked account.
    pub async fn profile(&self, access_token: &str) -> Result<String, IntegrationError> {
        let resp = self
            .client
            .get(self.api_url("/gmail/v1/users/me/profile"))
            .bearer_auth(access_token)
            .send()
            .await?;
        let profile: Value = success(resp).await?.json().await?;
        profile
            .get("emailAddress")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(IntegrationError::MissingField("emailAddress"))
    }
}

/// Minimal single-part HTML message. Non-ASCII subjects use RFC 2047.
pub fn mime_message(to: &[String], subject: &str, body_html: &str) -> String {
    let subject = if subject.is_ascii() {
        subject.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(subject))
    };
    format!(
        "To: {}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=\"utf-8\"\r\n\r\n{body_html}",
        to.join(", ")
    )
}
