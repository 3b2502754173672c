//! Error types for Knowgraph

use thiserror::Error;

/// Result type alias using Knowgraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Knowgraph error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Entity '{0}' not found. Run `knowgraph show` to see all entities.")]
    EntityNotFound(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Provider '{0}' is unavailable: {1}")]
    ProviderUnavailable(String, String),

    // Quota errors (E200-E299)
    #[error("Request quota exhausted for {provider}/{model}")]
    QuotaExhausted { provider: String, model: String },

    // Generation errors (E300-E399)
    #[error("Graph generation failed: {0}")]
    GenerationFailed(String),

    // Storage errors (E400-E499)
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Routing errors (E1100-E1199)
    #[error("No suitable model found: {0}")]
    NoSuitableModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "E001",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::ProviderUnavailable(..) => "E103",
            Self::QuotaExhausted { .. } => "E200",
            Self::GenerationFailed(_) => "E300",
            Self::StorageError(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::NoSuitableModel(_) => "E1101",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::EntityNotFound(_) => Some("knowgraph show".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::ProviderUnavailable(provider, _) => {
                Some(format!("Check the API key environment variable for provider '{}'", provider))
            }
            Self::QuotaExhausted { .. } | Self::NoSuitableModel(_) => {
                Some("knowgraph providers".to_string())
            }
            Self::ConfigError(_) => Some("knowgraph config list".to_string()),
            _ => None,
        }
    }

    /// Whether the provider fallback loop may move on to the next candidate
    ///
    /// Transport, quota, and model availability failures are specific to one
    /// provider/model pair. Anything else (bad input, storage, parsing) would
    /// fail the same way on every candidate.
    pub fn allows_fallback(&self) -> bool {
        match self {
            Self::NetworkError(_)
            | Self::RateLimited(_)
            | Self::ProviderUnavailable(..)
            | Self::QuotaExhausted { .. } => true,
            Self::LLMError(msg) => is_model_error(msg),
            _ => false,
        }
    }
}

/// Check if an error message indicates a model-specific error
pub(crate) fn is_model_error(msg: &str) -> bool {
    let model_error_patterns = [
        "model not found",
        "unavailable",
        "not available",
        "no available provider",
        "overloaded",
        "capacity",
        "server error",
    ];

    let msg_lower = msg.to_lowercase();
    model_error_patterns
        .iter()
        .any(|pattern| msg_lower.contains(pattern))
}
