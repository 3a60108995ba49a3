//! Plain-text extraction from stored documents.

use crate::AiError;

/// Text content of a document, if it is text.
///
/// `text/*` types are decoded lossily; other types are accepted only when the
/// bytes are valid UTF-8 without NUL bytes. Binary formats are rejected.
pub fn extract_text(bytes: &[u8], file_type: &str) -> Result<String, AiError> {
    let base = file_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if base.starts_with("text/") || matches!(base.as_str(), "application/json" | "application/xml") {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') && !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(AiError::UnsupportedContent(if base.is_empty() {
            "unknown".into()
        } else {
            base
        })),
    }
}
