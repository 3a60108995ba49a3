//! Generative AI layer: a Gemini `generateContent` client and the prompts
//! built on it.

mod error;
pub use error::AiError;

pub mod extract;
mod gemini;
pub mod tasks;

pub use gemini::GeminiClient;
