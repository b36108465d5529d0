use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use common::domain::{ConfirmationMessage, ConfirmationQueue, DomainError, DomainResult};
use common::nats::{deliver_after_headers, JetStreamPublisher};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Delay queue producer over JetStream.
///
/// Messages are published immediately with a deliver-after stamp; the
/// confirmation consumer holds them back until the stamp has passed.
pub struct NatsConfirmationQueue {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
    debounce_window: TimeDelta,
}

impl NatsConfirmationQueue {
    pub fn new(
        publisher: Arc<dyn JetStreamPublisher>,
        base_subject: String,
        debounce_window: TimeDelta,
    ) -> Self {
        debug!(
            base_subject = %base_subject,
            debounce_window_secs = debounce_window.num_seconds(),
            "initialized NatsConfirmationQueue"
        );

        Self {
            publisher,
            base_subject,
            debounce_window,
        }
    }
}

#[async_trait]
impl ConfirmationQueue for NatsConfirmationQueue {
    #[instrument(skip_all, fields(device_id = %message.device_id, transient_id = %message.transient_id))]
    async fn enqueue(&self, message: &ConfirmationMessage) -> DomainResult<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| DomainError::MalformedMessage(format!("cannot encode: {}", e)))?;

        let deliver_after = Utc::now() + self.debounce_window;
        let subject = format!("{}.{}", self.base_subject, message.device_id);

        self.publisher
            .publish_with_headers(
                subject,
                deliver_after_headers(deliver_after),
                Bytes::from(payload),
            )
            .await
            .map_err(DomainError::DependencyUnavailable)?;

        debug!(deliver_after = %deliver_after, "confirmation enqueued");
        Ok(())
    }
}
