use crate::nats::trace_context::inject_trace_context;
use crate::nats::traits::{
    JetStreamConsumer, JetStreamPublisher, KeyValueBucket, KvEntry, PullConsumer,
};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, kv, stream::Config as StreamConfig};
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        // Configure connection timeout for establishing the TCP connection
        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self { client, jetstream })
    }

    /// Ensure a stream named `stream_name` exists, capturing `{stream_name}.>`
    pub async fn ensure_stream(&self, stream_name: &str, description: &str) -> Result<()> {
        info!(stream = %stream_name, "Ensuring stream exists");

        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => {
                info!(stream = %stream_name, "Stream already exists");
            }
            Err(_) => {
                let stream_config = StreamConfig {
                    name: stream_name.to_string(),
                    subjects: vec![format!("{}.>", stream_name)],
                    description: Some(description.to_string()),
                    ..Default::default()
                };
                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %stream_name, "Created stream");
            }
        }

        Ok(())
    }

    /// Open (or create) a key-value bucket
    pub async fn key_value_bucket(&self, bucket: &str) -> Result<Arc<dyn KeyValueBucket>> {
        let store = match self.jetstream.get_key_value(bucket).await {
            Ok(store) => {
                debug!(bucket = %bucket, "key-value bucket already exists");
                store
            }
            Err(_) => {
                info!(bucket = %bucket, "Creating key-value bucket");
                self.jetstream
                    .create_key_value(kv::Config {
                        bucket: bucket.to_string(),
                        history: 1,
                        ..Default::default()
                    })
                    .await
                    .context("Failed to create key-value bucket")?
            }
        };

        Ok(Arc::new(NatsKeyValueBucket { store }))
    }

    /// Create a JetStreamConsumer trait object from this client
    pub fn create_consumer_client(&self) -> Arc<dyn JetStreamConsumer> {
        Arc::new(NatsJetStreamConsumer::new(self.jetstream.clone()))
    }

    /// Create a JetStreamPublisher trait object from this client
    pub fn create_publisher_client(&self) -> Arc<dyn JetStreamPublisher> {
        Arc::new(NatsJetStreamPublisher::new(self.jetstream.clone()))
    }

    /// Flush outstanding publishes before the connection is dropped
    pub async fn close(self) {
        info!("Closing NATS connection");
        if let Err(e) = self.client.flush().await {
            error!(error = %e, "Failed to flush NATS connection");
        }
    }
}

/// Concrete implementation of JetStreamConsumer using async-nats
pub struct NatsJetStreamConsumer {
    context: jetstream::Context,
}

impl NatsJetStreamConsumer {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamConsumer for NatsJetStreamConsumer {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        Ok(Box::new(NatsPullConsumer { consumer }))
    }
}

/// Concrete implementation of PullConsumer using async-nats
pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut result = Vec::new();
        while let Some(msg) = messages.next().await {
            match msg {
                Ok(message) => result.push(message),
                Err(e) => {
                    error!(error = %e, "Error receiving message");
                }
            }
        }
        Ok(result)
    }
}

/// Concrete implementation of JetStreamPublisher using async-nats
pub struct NatsJetStreamPublisher {
    context: jetstream::Context,
}

impl NatsJetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamPublisher for NatsJetStreamPublisher {
    #[instrument(skip(self, headers, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish_with_headers(
        &self,
        subject: String,
        mut headers: HeaderMap,
        payload: Bytes,
    ) -> Result<()> {
        inject_trace_context(&mut headers);

        let ack = self
            .context
            .publish_with_headers(subject, headers, payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;
        Ok(())
    }
}

/// Concrete implementation of KeyValueBucket over a JetStream KV store
pub struct NatsKeyValueBucket {
    store: kv::Store,
}

#[async_trait]
impl KeyValueBucket for NatsKeyValueBucket {
    async fn entry(&self, key: &str) -> Result<Option<KvEntry>> {
        let entry = self
            .store
            .entry(key)
            .await
            .with_context(|| format!("Failed to read key '{}'", key))?;

        Ok(entry
            .filter(|e| matches!(e.operation, kv::Operation::Put))
            .map(|e| KvEntry {
                value: e.value,
                revision: e.revision,
            }))
    }

    async fn update(&self, key: &str, value: Bytes, revision: u64) -> Result<bool> {
        match self.store.update(key, value, revision).await {
            Ok(_) => Ok(true),
            Err(err) if matches!(err.kind(), kv::UpdateErrorKind::WrongLastRevision) => Ok(false),
            Err(err) => Err(err).with_context(|| format!("Failed to update key '{}'", key)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys = self
            .store
            .keys()
            .await
            .context("Failed to list bucket keys")?;

        keys.try_collect()
            .await
            .context("Failed to read bucket keys")
    }
}
