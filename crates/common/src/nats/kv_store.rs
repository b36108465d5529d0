use crate::nats::KeyValueBucket;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Revision conflicts tolerated before a write is given up
pub const DEFAULT_MAX_CAS_ATTEMPTS: usize = 5;

/// JSON records in a key-value bucket, written by compare-and-swap.
///
/// Every modification reads the entry together with its revision, applies the
/// change to the decoded record and writes it back only if nobody else wrote
/// in between. On a conflict the whole read-modify-write is replayed so a
/// concurrent writer's fields are never overwritten with stale values.
#[derive(Clone)]
pub struct JsonBucket {
    bucket: Arc<dyn KeyValueBucket>,
    max_attempts: usize,
}

impl JsonBucket {
    pub fn new(bucket: Arc<dyn KeyValueBucket>) -> Self {
        Self {
            bucket,
            max_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Read and decode a record, `None` if the key does not exist
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.bucket.entry(key).await? {
            Some(entry) => {
                let record = serde_json::from_slice(&entry.value)
                    .with_context(|| format!("Failed to decode record '{}'", key))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Apply `change` to the stored record and write it back atomically.
    /// Returns the written record, or `None` if the key does not exist.
    pub async fn modify<T, F>(&self, key: &str, mut change: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut(&mut T) + Send,
    {
        let outcome = self
            .modify_if(key, |record: &mut T| {
                change(record);
                true
            })
            .await?;

        Ok(outcome.map(|(record, _)| record))
    }

    /// Conditional read-modify-write. `change` inspects the record read at the
    /// current revision and returns `false` to leave it untouched, in which
    /// case nothing is written. The decision and the write share one revision,
    /// so a concurrent writer forces the decision to be made again.
    ///
    /// Returns the resulting record and whether it was written, or `None` if
    /// the key does not exist.
    pub async fn modify_if<T, F>(&self, key: &str, mut change: F) -> Result<Option<(T, bool)>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut(&mut T) -> bool + Send,
    {
        for attempt in 1..=self.max_attempts {
            let Some(entry) = self.bucket.entry(key).await? else {
                return Ok(None);
            };

            let mut record: T = serde_json::from_slice(&entry.value)
                .with_context(|| format!("Failed to decode record '{}'", key))?;
            if !change(&mut record) {
                return Ok(Some((record, false)));
            }

            let value = serde_json::to_vec(&record)
                .with_context(|| format!("Failed to encode record '{}'", key))?;

            if self
                .bucket
                .update(key, Bytes::from(value), entry.revision)
                .await?
            {
                return Ok(Some((record, true)));
            }

            debug!(
                key = %key,
                revision = entry.revision,
                attempt,
                "revision conflict, retrying write"
            );
        }

        bail!(
            "gave up writing '{}' after {} revision conflicts",
            key,
            self.max_attempts
        )
    }

    /// List every key in the bucket
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.bucket.keys().await
    }
}
