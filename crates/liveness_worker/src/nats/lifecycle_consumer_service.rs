use crate::domain::{decode_connectivity_event, LifecycleEventService};
use crate::nats::response_for_error;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// Tower service feeding raw connectivity events into the router
#[derive(Clone)]
pub struct LifecycleConsumerService {
    domain_service: Arc<LifecycleEventService>,
}

impl LifecycleConsumerService {
    pub fn new(domain_service: Arc<LifecycleEventService>) -> Self {
        Self { domain_service }
    }
}

impl Service<ConsumeRequest> for LifecycleConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let domain_service = Arc::clone(&self.domain_service);

        Box::pin(async move {
            let result = match decode_connectivity_event(&req.payload) {
                Ok(event) => domain_service.handle_event(event).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    debug!(subject = %req.subject, outcome = ?outcome, "connectivity event handled");
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
    use chrono::{DateTime, Utc};
    use common::domain::{
        ConnectionStatus, DomainError, MockConfirmationQueue, MockDeviceRegistry, MockNotifier,
        MockShadowStore, ShadowRecord,
    };
    use tower::ServiceExt;

    fn shadow(status: ConnectionStatus) -> ShadowRecord {
        ShadowRecord {
            connection_status: status,
            status_updated: DateTime::<Utc>::UNIX_EPOCH,
            transient_id: "t".to_string(),
            transient_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn consumer(shadows: MockShadowStore) -> LifecycleConsumerService {
        LifecycleConsumerService::new(Arc::new(LifecycleEventService::new(
            Arc::new(shadows),
            Arc::new(MockDeviceRegistry::new()),
            Arc::new(MockNotifier::new()),
            Arc::new(MockConfirmationQueue::new()),
        )))
    }

    fn request(payload: &'static [u8]) -> ConsumeRequest {
        ConsumeRequest::new(
            "device_lifecycle.dag-01".to_string(),
            Bytes::from_static(payload),
            None,
        )
    }

    #[tokio::test]
    async fn test_duplicate_event_is_acked() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows.expect_set_transient_id().returning(|_, _| Ok(()));
        shadows
            .expect_get()
            .returning(|_| Ok(shadow(ConnectionStatus::Connected)));
        let service = consumer(shadows);

        // Act
        let response = service
            .oneshot(request(
                br#"{"deviceId":"dag-01","eventType":"connected","timestampMillis":0}"#,
            ))
            .await
            .unwrap();

        // Assert
        assert!(response.is_ack());
    }

    #[tokio::test]
    async fn test_malformed_event_is_terminated_without_touching_shadow() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows.expect_set_transient_id().times(0);
        let service = consumer(shadows);

        // Act
        let response = service
            .oneshot(request(br#"{"deviceId":"dag-01","eventType":"sleeping"}"#))
            .await
            .unwrap();

        // Assert
        assert!(matches!(response, ConsumeResponse::Term(_)));
    }

    #[tokio::test]
    async fn test_store_outage_is_redelivered() {
        // Arrange
        let mut shadows = MockShadowStore::new();
        shadows
            .expect_set_transient_id()
            .returning(|_, _| Err(DomainError::DependencyUnavailable(anyhow::anyhow!("down"))));
        let service = consumer(shadows);

        // Act
        let response = service
            .oneshot(request(
                br#"{"deviceId":"dag-01","eventType":"disconnected","timestampMillis":0}"#,
            ))
            .await
            .unwrap();

        // Assert
        assert!(matches!(response, ConsumeResponse::Nak(_)));
    }
}
