#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsultError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("server rejected request (status {status}): {message}")]
    ServerRejection { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConsultError {
    /// Convenience constructor for local precondition failures.
    pub fn validation(message: impl Into<String>) -> Self {
        ConsultError::Validation(message.into())
    }

    /// Whether the failure came back from the remote side rather than a local check.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ConsultError::Network(_)
                | ConsultError::ServerRejection { .. }
                | ConsultError::Authentication(_)
                | ConsultError::MalformedResponse(_)
        )
    }
}

pub type ConsultResult<T> = std::result::Result<T, ConsultError>;
