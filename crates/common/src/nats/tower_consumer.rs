use crate::nats::{ConsumeRequest, ConsumeResponse, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, AckKind};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, warn};

/// Settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub stream_name: String,
    pub consumer_name: String,
    pub subject_filter: String,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// A NATS consumer that pushes every message through a Tower service stack.
///
/// Each message becomes an owned [`ConsumeRequest`]; the returned
/// [`ConsumeResponse`] decides how the message is acknowledged.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    settings: ConsumerSettings,
    service: S,
}

/// JetStream acknowledgement for a consume outcome
pub fn ack_kind(response: &ConsumeResponse) -> AckKind {
    match response {
        ConsumeResponse::Ack => AckKind::Ack,
        ConsumeResponse::Nak(_) => AckKind::Nak(None),
        ConsumeResponse::Delay(delay) => AckKind::Nak(Some(*delay)),
        ConsumeResponse::Term(_) => AckKind::Term,
    }
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        settings: ConsumerSettings,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %settings.stream_name,
            consumer = %settings.consumer_name,
            filter_subject = %settings.subject_filter,
            "creating tower nats consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(settings.consumer_name.clone()),
            durable_name: Some(settings.consumer_name.clone()),
            filter_subject: settings.subject_filter.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, &settings.stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Self {
            consumer,
            settings,
            service,
        })
    }

    /// Run the consumer loop until cancellation
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.settings.stream_name,
            consumer = %self.settings.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(
                        stream = %self.settings.stream_name,
                        consumer = %self.settings.consumer_name,
                        "received shutdown signal, stopping consumer"
                    );
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(
                            stream = %self.settings.stream_name,
                            consumer = %self.settings.consumer_name,
                            error = %e,
                            "error processing batch"
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_and_process_batch(&mut self) -> Result<()> {
        let raw_messages = self
            .consumer
            .fetch_messages(self.settings.batch_size, self.settings.max_wait)
            .await?;

        if raw_messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = raw_messages.len(), "received message batch");

        for msg in &raw_messages {
            let request = ConsumeRequest::new(
                msg.subject.to_string(),
                Bytes::copy_from_slice(&msg.payload),
                msg.headers.clone(),
            );

            let response = match self.service.call(request).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(
                        subject = %msg.subject,
                        error = %e,
                        "service error processing message"
                    );
                    ConsumeResponse::nak(e.to_string())
                }
            };

            match &response {
                ConsumeResponse::Nak(Some(reason)) => {
                    warn!(subject = %msg.subject, reason = %reason, "rejecting message for redelivery");
                }
                ConsumeResponse::Term(reason) => {
                    warn!(subject = %msg.subject, reason = %reason, "terminating message");
                }
                _ => {}
            }

            if let Err(e) = msg.ack_with(ack_kind(&response)).await {
                error!(
                    subject = %msg.subject,
                    outcome = response.outcome(),
                    error = %e,
                    "failed to acknowledge message"
                );
            }
        }

        Ok(())
    }
}
