use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Gemini AI is not configured (GEMINI_API_KEY is unset)")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the model returned no text")]
    EmptyResponse,

    #[error("the model did not return a JSON array of strings: {0}")]
    NotAJsonArray(String),

    #[error("cannot extract text from {0} files")]
    UnsupportedContent(String),
}
