//! Prompted tasks built on [`GeminiClient::generate`].
//!
//! Each task owns its prompt and the parsing of the model's answer. Inputs
//! are truncated to [`MAX_PROMPT_CHARS`] characters before being sent.

use notaria_core::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{AiError, GeminiClient};

pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Section names a segmented document is split into.
pub const SECTIONS: [&str; 4] = ["Executive Summary", "Introduction", "Body", "Conclusion"];

// ── Clients ──

/// Suggest segmentation tags (e.g. "High Net Worth") for a client.
pub async fn segmentation_tags(gemini: &GeminiClient, client: &Client) -> Result<Vec<String>, AiError> {
    let prompt = format!(
        "Analyze the following client information and suggest segmentation tags \
         (e.g. \"High Net Worth\", \"Small Business\", \"Real Estate Investor\", \"First-time Buyer\"). \
         Return only a JSON array of strings.\n\n{}",
        truncate(&client.profile_text())
    );
    let reply = gemini.generate(&prompt).await?;
    parse_json_array(&reply)
}

// ── Workflows ──

/// Suggest an ordered list of workflow step names for a matter.
pub async fn workflow_steps(
    gemini: &GeminiClient,
    title: &str,
    description: Option<&str>,
) -> Result<Vec<String>, AiError> {
    let prompt = format!(
        "Based on the following notarial matter title and description, suggest a sequence \
         of logical workflow steps. Return the steps as a JSON array of strings.\n\n\
         Title: {title}\nDescription: {}",
        truncate(description.unwrap_or(""))
    );
    let reply = gemini.generate(&prompt).await?;
    parse_json_array(&reply)
}

// ── Documents ──

pub async fn summarize(gemini: &GeminiClient, content: &str) -> Result<String, AiError> {
    let prompt = format!("Summarize the key points of this document:\n\n{}", truncate(content));
    Ok(gemini.generate(&prompt).await?.trim().to_string())
}

/// Split a document into [`SECTIONS`].
///
/// Returns `{"sections": [...], "segments": {...} | null, "text": "..."}`;
/// `segments` is filled when the model answered with a JSON object, the raw
/// reply is always kept under `text`.
pub async fn segment(gemini: &GeminiClient, content: &str) -> Result<Value, AiError> {
    let prompt = format!(
        "Segment this document into the following sections: {}. \
         Return a JSON object whose keys are the section names and whose values are the \
         section text.\n\n{}",
        SECTIONS.join(", "),
        truncate(content)
    );
    let reply = gemini.generate(&prompt).await?;
    let segments = match serde_json::from_str::<Value>(strip_fences(&reply)) {
        Ok(obj @ Value::Object(_)) => obj,
        _ => {
            debug!("segmentation reply is not a JSON object; keeping raw text only");
            Value::Null
        }
    };
    Ok(json!({
        "sections": SECTIONS,
        "segments": segments,
        "text": reply.trim(),
    }))
}

// ── Parsing ──

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Models like to wrap JSON in markdown code fences.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a JSON array of strings, dropping blank entries.
pub fn parse_json_array(reply: &str) -> Result<Vec<String>, AiError> {
    let body = strip_fences(reply);
    match serde_json::from_str::<Vec<String>>(body) {
        Ok(items) => Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        Err(e) => {
            warn!(error = %e, "model reply is not a JSON array of strings");
            Err(AiError::NotAJsonArray(body.chars().take(200).collect()))
        }
    }
}
