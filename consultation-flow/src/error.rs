use std::time::Duration;

use thiserror::Error;

/// Errors raised by the consultation flow and its collaborators
#[derive(Debug, Error)]
pub enum FlowError {
    /// User input rejected locally; the flow re-prompts without changing state
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// 401 from the service or no usable session; callers must force a logout
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Response body could not be decoded; `raw` keeps the body for display
    #[error("Could not decode response: {message}")]
    Parse { message: String, raw: String },

    #[error("Unrecognized response format: {0}")]
    UnrecognizedFormat(String),

    /// Non-2xx answer carrying a `detail`/`error` message or the status line
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Failures of an outbound request, as opposed to local validation or storage
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            FlowError::Network(_)
                | FlowError::Timeout(_)
                | FlowError::Parse { .. }
                | FlowError::UnrecognizedFormat(_)
                | FlowError::Service { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
