use common::domain::DomainError;
use common::nats::ConsumeResponse;
use tracing::{error, warn};

/// Acknowledgement for a message whose handling failed.
///
/// Malformed input can never succeed and is terminated. Dependency outages
/// are rejected for redelivery. Anything else (unknown devices, failed
/// notifications after a committed change) is logged and acknowledged.
pub fn response_for_error(subject: &str, err: &DomainError) -> ConsumeResponse {
    if err.is_malformed_input() {
        warn!(subject = %subject, error = %err, "dropping malformed message");
        return ConsumeResponse::term(err.to_string());
    }

    if err.is_retryable() {
        warn!(subject = %subject, error = %err, "dependency unavailable, requesting redelivery");
        return ConsumeResponse::nak(err.to_string());
    }

    error!(subject = %subject, error = %err, "message could not be applied, acknowledging");
    ConsumeResponse::ack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_is_terminated() {
        let response =
            response_for_error("s", &DomainError::MalformedEvent("bad json".to_string()));
        assert!(matches!(response, ConsumeResponse::Term(_)));

        let response =
            response_for_error("s", &DomainError::MalformedMessage("bad json".to_string()));
        assert!(matches!(response, ConsumeResponse::Term(_)));
    }

    #[test]
    fn test_dependency_failure_is_redelivered() {
        let response = response_for_error(
            "s",
            &DomainError::DependencyUnavailable(anyhow::anyhow!("kv timeout")),
        );
        assert!(matches!(response, ConsumeResponse::Nak(Some(_))));
    }

    #[test]
    fn test_terminal_failures_are_acknowledged() {
        assert!(response_for_error("s", &DomainError::DeviceNotFound("d".to_string())).is_ack());
        assert!(response_for_error("s", &DomainError::ShadowNotFound("d".to_string())).is_ack());
        assert!(
            response_for_error("s", &DomainError::DeliveryFailure("smtp".to_string())).is_ack()
        );
    }
}
