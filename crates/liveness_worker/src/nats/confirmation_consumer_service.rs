use crate::domain::{decode_confirmation_message, ConfirmationService};
use crate::nats::response_for_error;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// Tower service applying confirmation messages once they are due.
/// Meant to sit behind `DelayedDeliveryLayer`.
#[derive(Clone)]
pub struct ConfirmationConsumerService {
    domain_service: Arc<ConfirmationService>,
}

impl ConfirmationConsumerService {
    pub fn new(domain_service: Arc<ConfirmationService>) -> Self {
        Self { domain_service }
    }
}

impl Service<ConsumeRequest> for ConfirmationConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let domain_service = Arc::clone(&self.domain_service);

        Box::pin(async move {
            let result = match decode_confirmation_message(&req.payload) {
                Ok(message) => domain_service.handle_confirmation(message).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    debug!(subject = %req.subject, outcome = ?outcome, "confirmation handled");
                    Ok(ConsumeResponse::ack())
                }
                Err(e) => Ok(response_for_error(&req.subject, &e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use common::domain::{ConnectionStatus, MockDeviceRegistry, MockNotifier, MockShadowStore};
    use common::nats::{deliver_after_headers, DelayedDeliveryLayer};
    use tower::{Layer, ServiceExt};

    const PAYLOAD: &[u8] = br#"{
        "deviceId": "dag-01",
        "transientId": "old",
        "eventTime": "2024-03-01T12:00:00Z",
        "assertedStatus": "disconnected"
    }"#;

    fn consumer(shadows: MockShadowStore) -> ConfirmationConsumerService {
        ConfirmationConsumerService::new(Arc::new(ConfirmationService::new(
            Arc::new(shadows),
            Arc::new(MockDeviceRegistry::new()),
            Arc::new(MockNotifier::new()),
        )))
    }

    #[tokio::test]
    async fn test_superseded_confirmation_is_acked() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows
            .expect_commit_status_if_current()
            .withf(|_, tid: &str, status: &ConnectionStatus, _| {
                tid == "old" && *status == ConnectionStatus::Disconnected
            })
            .times(1)
            .returning(|_, _, _, _| Ok(false));
        let req = ConsumeRequest::new(
            "liveness_confirmations.dag-01".to_string(),
            Bytes::from_static(PAYLOAD),
            None,
        );

        // Act
        let response = consumer(shadows).oneshot(req).await.unwrap();

        // Assert
        assert!(response.is_ack());
    }

    #[tokio::test]
    async fn test_malformed_confirmation_is_terminated() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows.expect_commit_status_if_current().times(0);
        let req = ConsumeRequest::new(
            "liveness_confirmations.dag-01".to_string(),
            Bytes::from_static(b"{}"),
            None,
        );

        // Act
        let response = consumer(shadows).oneshot(req).await.unwrap();

        // Assert
        assert!(matches!(response, ConsumeResponse::Term(_)));
    }

    #[tokio::test]
    async fn test_early_confirmation_is_deferred_before_touching_shadow() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows.expect_commit_status_if_current().times(0);
        let service = DelayedDeliveryLayer::new().layer(consumer(shadows));
        let headers = deliver_after_headers(Utc::now() + chrono::Duration::seconds(30));
        let req = ConsumeRequest::new(
            "liveness_confirmations.dag-01".to_string(),
            Bytes::from_static(PAYLOAD),
            Some(headers),
        );

        // Act
        let response = service.oneshot(req).await.unwrap();

        // Assert
        assert!(matches!(response, ConsumeResponse::Delay(_)));
    }
}
