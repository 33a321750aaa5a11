use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config file not found: {path}")]
    MissingConfig { path: String },

    #[error("Fixture file not found: {path}")]
    MissingFixtures { path: String },

    #[error(transparent)]
    Pipeline(#[from] geoharmonize::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
