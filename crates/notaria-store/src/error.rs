use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A unique constraint rejected the write; the message is user-facing.
    #[error("{0}")]
    Conflict(String),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Map unique/primary-key violations to [`StoreError::Conflict`].
pub(crate) trait ConstraintExt<T> {
    fn on_conflict(self, message: &str) -> Result<T, StoreError>;
}

impl<T> ConstraintExt<T> for Result<T, ::duckdb::Error> {
    fn on_conflict(self, message: &str) -> Result<T, StoreError> {
        self.map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::Conflict(message.to_string())
            } else {
                StoreError::DuckDb(err)
            }
        })
    }
}

pub(crate) fn is_unique_violation(err: &::duckdb::Error) -> bool {
    let text = err.to_string();
    text.contains("Duplicate key") || text.contains("violates unique constraint") || text.contains("violates primary key constraint")
}
