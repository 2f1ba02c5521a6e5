//! Error types for ManasNav

use thiserror::Error;

/// ManasNav error type
///
/// Parse, timeout, and planning failures are recoverable and absorbed inside
/// the navigation cycle. `BridgeConfiguration` signals a setup defect and
/// aborts the running cycle instead of degrading silently.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Decision parse error: {0}")]
    DecisionParse(String),

    #[error("Inference timed out after {0} ms")]
    InferenceTimeout(u64),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Path planning failed: {0}")]
    Planning(String),

    #[error("World-model bridge misconfigured: {0}")]
    BridgeConfiguration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
