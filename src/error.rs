//! Crate-level error type and `Result` alias.
//! Configuration and schema variants are raised while a graph is being built,
//! before anything reaches an engine. `Evaluation` and `Formula` only come out
//! of an engine's `materialize` call.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error in {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("Schema error on band '{band}': {reason}")]
    Schema { band: String, reason: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Invalid formula: {0}")]
    Formula(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub fn schema(band: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            band: band.into(),
            reason: reason.into(),
        }
    }

    /// True for errors detectable from configuration alone.
    pub fn is_static(&self) -> bool {
        matches!(self, Error::Configuration { .. } | Error::Schema { .. })
    }
}
