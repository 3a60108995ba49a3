use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown {kind} value: {value:?}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("invalid protocol number: {0:?}")]
    InvalidProtocol(String),

    #[error("invalid date {value:?}: {reason}")]
    InvalidDate { value: String, reason: String },
}
