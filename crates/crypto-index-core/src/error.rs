use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data error for {context}: {reason}")]
    Data { context: String, reason: String },

    #[error("Zero divisor for period {period}")]
    ZeroDivisor { period: String },

    #[error("Empty result: no rebalancing period produced any index values")]
    EmptyResult,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl IndexError {
    pub fn data(context: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::Data {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::SerializationError(e.to_string())
    }
}
