use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use common::domain::{DomainError, DomainResult, Notifier, VisibilityNotification};
use common::nats::JetStreamPublisher;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Publishes visibility notifications for the downstream emailer, one
/// subject per account: `{base_subject}.{account_id}`
pub struct NatsNotifier {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl NatsNotifier {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        Self {
            publisher,
            base_subject,
        }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    #[instrument(
        skip_all,
        fields(
            account_id = %notification.account_id,
            device_id = %notification.device_id,
            status = notification.status
        )
    )]
    async fn send(&self, notification: &VisibilityNotification) -> DomainResult<()> {
        let payload = serde_json::to_vec(notification)
            .map_err(|e| DomainError::DeliveryFailure(format!("cannot encode: {}", e)))?;
        let subject = format!("{}.{}", self.base_subject, notification.account_id);

        self.publisher
            .publish_with_headers(subject, HeaderMap::new(), Bytes::from(payload))
            .await
            .map_err(|e| DomainError::DeliveryFailure(format!("{:#}", e)))?;

        debug!("visibility notification published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use common::nats::MockJetStreamPublisher;

    fn notification() -> VisibilityNotification {
        VisibilityNotification {
            account_id: "acct-1".to_string(),
            device_id: "dag-01".to_string(),
            device_name: "Garage".to_string(),
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            status: false,
        }
    }

    #[tokio::test]
    async fn test_send_publishes_to_account_subject() {
        // Arrange
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_publish_with_headers()
            .withf(|subject: &String, _, payload: &Bytes| {
                let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
                subject == "visibility_notifications.acct-1"
                    && json["deviceName"] == "Garage"
                    && json["status"] == false
                    && json["timestamp"] == "1970-01-01T00:00:00Z"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let notifier = NatsNotifier::new(
            Arc::new(publisher),
            "visibility_notifications".to_string(),
        );

        // Act
        let result = notifier.send(&notification()).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_is_delivery_failure() {
        // Arrange
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_publish_with_headers()
            .returning(|_, _, _| Err(anyhow::anyhow!("stream not found")));
        let notifier = NatsNotifier::new(
            Arc::new(publisher),
            "visibility_notifications".to_string(),
        );

        // Act
        let result = notifier.send(&notification()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::DeliveryFailure(_))));
    }
}
