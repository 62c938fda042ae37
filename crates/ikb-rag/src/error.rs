use thiserror::Error;

/// Errors surfaced by the retrieval pipeline.
///
/// Running out of evidence is not an error: the confidence gate reports it as
/// [`crate::rag::gate::GateDecision::Reject`] and the engine answers normally.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or missing input, rejected before any pipeline stage runs.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Broken configuration, detected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An embedding or chat provider call failed.
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Vector store or audit persistence failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A request deadline expired while waiting on an external call.
    #[error("deadline exceeded during {0}")]
    Timeout(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the caller is at fault (maps to a 4xx at the HTTP boundary).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        let err = RagError::provider("local", "exit status 1");
        assert_eq!(err.to_string(), "provider 'local' failed: exit status 1");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_validation_is_client_error() {
        assert!(RagError::Validation("empty question".into()).is_client_error());
        assert!(!RagError::Storage("down".into()).is_client_error());
    }
}
