use crate::domain::{decode_device_seen_event, RediscoveryService};
use crate::nats::response_for_error;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// Tower service feeding device heartbeats into the re-discovery handler
#[derive(Clone)]
pub struct DeviceSeenConsumerService {
    domain_service: Arc<RediscoveryService>,
}

impl DeviceSeenConsumerService {
    pub fn new(domain_service: Arc<RediscoveryService>) -> Self {
        Self { domain_service }
    }
}

impl Service<ConsumeRequest> for DeviceSeenConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let domain_service = Arc::clone(&self.domain_service);

        Box::pin(async move {
            let result = match decode_device_seen_event(&req.payload) {
                Ok(event) => domain_service.handle_seen(event).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    debug!(subject = %req.subject, outcome = ?outcome, "device heartbeat handled");
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
    use common::domain::{Device, DomainError, MockDeviceRegistry, MockNotifier};
    use tower::ServiceExt;

    fn consumer(registry: MockDeviceRegistry, notifier: MockNotifier) -> DeviceSeenConsumerService {
        DeviceSeenConsumerService::new(Arc::new(RediscoveryService::new(
            Arc::new(registry),
            Arc::new(notifier),
        )))
    }

    fn request(payload: &'static [u8]) -> ConsumeRequest {
        ConsumeRequest::new(
            "device_seen.dag-01".to_string(),
            Bytes::from_static(payload),
            None,
        )
    }

    #[tokio::test]
    async fn test_notification_failure_is_acked() {
        // Arrange
        let mut registry = MockDeviceRegistry::new();
        let mut notifier = MockNotifier::new();
        registry.expect_get().returning(|id| {
            Ok(Device {
                device_id: id.to_string(),
                name: "Garage".to_string(),
                account_id: "acct-1".to_string(),
                visible: false,
                last_seen: None,
            })
        });
        registry.expect_record_seen().times(1).returning(|_, _| Ok(true));
        notifier
            .expect_send()
            .returning(|_| Err(DomainError::DeliveryFailure("no stream".to_string())));

        // Act
        let response = consumer(registry, notifier)
            .oneshot(request(br#"{"deviceId":"dag-01","timestampMillis":1000}"#))
            .await
            .unwrap();

        // Assert
        assert!(response.is_ack());
    }

    #[tokio::test]
    async fn test_bad_device_id_is_terminated() {
        // Arrange
        let mut registry = MockDeviceRegistry::new();
        registry.expect_get().times(0);

        // Act
        let response = consumer(registry, MockNotifier::new())
            .oneshot(request(br#"{"deviceId":"","timestampMillis":1000}"#))
            .await
            .unwrap();

        // Assert
        assert!(matches!(response, ConsumeResponse::Term(_)));
    }
}
