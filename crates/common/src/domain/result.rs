use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed connectivity event: {0}")]
    MalformedEvent(String),

    #[error("Malformed confirmation message: {0}")]
    MalformedMessage(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Shadow not found for device: {0}")]
    ShadowNotFound(String),

    #[error("Notification delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(#[from] anyhow::Error),
}

impl DomainError {
    /// Only dependency outages are worth redelivering; everything else fails
    /// the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::DependencyUnavailable(_))
    }

    /// Input that can never be processed, regardless of system state.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            DomainError::MalformedEvent(_)
                | DomainError::MalformedMessage(_)
                | DomainError::ValidationError(_)
        )
    }
}
