//! Gemini `generateContent` client.

use std::time::Duration;

use notaria_core::settings::GeminiSettings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AiError;

/// Client for the Gemini REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client. A missing API key is not an error here; every call
    /// then fails with [`AiError::NotConfigured`].
    pub fn new(settings: &GeminiSettings, timeout: Duration) -> Result<Self, AiError> {
        if settings.api_key.is_none() {
            warn!("GEMINI_API_KEY not set; AI features are unavailable");
        }
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the concatenated text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        info!(model = %self.model, prompt_chars = prompt.len(), "calling gemini");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        info!(response_chars = text.len(), "gemini responded");
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::IntoResponse;

    #[derive(Default, Clone)]
    pub(crate) struct Seen {
        pub path: Arc<Mutex<Option<String>>>,
        pub key: Arc<Mutex<Option<String>>>,
        pub prompt: Arc<Mutex<Option<String>>>,
    }

    /// Fake Gemini answering every request with `reply` (or `status` if not 200).
    pub(crate) async fn fake_gemini(status: StatusCode, reply: &'static str) -> (String, Seen) {
        let seen = Seen::default();
        let state = seen.clone();
        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: String| {
            let state = state.clone();
            async move {
                *state.path.lock().unwrap() = Some(uri.path().to_string());
                *state.key.lock().unwrap() = headers
                    .get("x-goog-api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let json: serde_json::Value = serde_json::from_str(&body).unwrap();
                *state.prompt.lock().unwrap() = json["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .map(str::to_string);
                if status != StatusCode::OK {
                    return (status, "quota exceeded").into_response();
                }
                axum::Json(serde_json::json!({
                    "candidates": [{"content": {"parts": [{"text": reply}]}}]
                }))
                .into_response()
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), seen)
    }

    pub(crate) fn client(base_url: &str, key: Option<&str>) -> GeminiClient {
        let settings = GeminiSettings {
            api_key: key.map(str::to_string),
            model: "gemini-pro".into(),
            base_url: base_url.into(),
        };
        GeminiClient::new(&settings, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn generate_posts_prompt_with_key() {
        let (url, seen) = fake_gemini(StatusCode::OK, "Hello there").await;
        let gemini = client(&url, Some("secret"));
        assert_eq!(gemini.generate("Say hello").await.unwrap(), "Hello there");
        assert_eq!(
            seen.path.lock().unwrap().as_deref(),
            Some("/v1beta/models/gemini-pro:generateContent")
        );
        assert_eq!(seen.key.lock().unwrap().as_deref(), Some("secret"));
        assert_eq!(seen.prompt.lock().unwrap().as_deref(), Some("Say hello"));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let (url, _) = fake_gemini(StatusCode::TOO_MANY_REQUESTS, "").await;
        let err = client(&url, Some("secret")).generate("x").await.unwrap_err();
        assert!(matches!(err, AiError::Server { status: 429, .. }));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let gemini = client("http://127.0.0.1:9", None);
        assert!(!gemini.is_configured());
        assert!(matches!(gemini.generate("x").await, Err(AiError::NotConfigured)));
    }

    #[test]
    fn trims_trailing_slash() {
        let gemini = client("http://localhost:4000/", Some("k"));
        assert_eq!(gemini.base_url, "http://localhost:4000");
    }
}
