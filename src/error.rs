//! Error types for the Mailweave thread generation engine.

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Upstream input broke an invariant the engine relies on. Fatal, never retried.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Invalid provider response for {operation}: {message}")]
    InvalidResponse { operation: String, message: String },

    #[error("Attachment rendering failed for {kind}: {message}")]
    AttachmentRender { kind: String, message: String },

    #[error("Message sink error: {0}")]
    SinkError(String),

    #[error("Topic catalog error: {0}")]
    CatalogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, EngineError::ContractViolation(_))
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Io(format!("JSON error: {}", err))
    }
}
