//! Error types for groundcheck

use thiserror::Error;

/// Result type alias using GroundCheckError
pub type Result<T> = std::result::Result<T, GroundCheckError>;

/// Error type alias for convenience
pub type Error = GroundCheckError;

/// Main error type for groundcheck
///
/// Capability failures (LLM down, vector store missing, malformed model
/// output) are NOT represented here: those degrade to documented fallbacks
/// inside each pipeline stage. Only contract violations and infrastructure
/// setup failures surface as errors.
#[derive(Debug, Error)]
pub enum GroundCheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
