use crate::domain::{ConnectionStatus, DomainError, DomainResult, ShadowRecord, ShadowStore};
use crate::nats::{JsonBucket, KeyValueBucket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Device shadows kept as JSON records in a JetStream key-value bucket
pub struct KvShadowStore {
    records: JsonBucket,
}

impl KvShadowStore {
    pub fn new(bucket: Arc<dyn KeyValueBucket>) -> Self {
        Self {
            records: JsonBucket::new(bucket),
        }
    }
}

#[async_trait]
impl ShadowStore for KvShadowStore {
    #[instrument(skip_all, fields(device_id = %device_id))]
    async fn get(&self, device_id: &str) -> DomainResult<ShadowRecord> {
        self.records
            .get::<ShadowRecord>(device_id)
            .await?
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))
    }

    #[instrument(skip_all, fields(device_id = %device_id, transient_id = %transient_id))]
    async fn set_transient_id(&self, device_id: &str, transient_id: &str) -> DomainResult<()> {
        let stamped_at = Utc::now();
        self.records
            .modify::<ShadowRecord, _>(device_id, |shadow| {
                shadow.transient_id = transient_id.to_string();
                shadow.transient_updated = stamped_at;
            })
            .await?
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;

        debug!("transient id stamped");
        Ok(())
    }

    #[instrument(skip_all, fields(device_id = %device_id, status = %status))]
    async fn set_connection_status(
        &self,
        device_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.records
            .modify::<ShadowRecord, _>(device_id, |shadow| {
                shadow.connection_status = status;
                shadow.status_updated = updated;
            })
            .await?
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;

        debug!("connection status committed");
        Ok(())
    }

    #[instrument(skip_all, fields(device_id = %device_id, status = %status, transient_id = %expected_transient_id))]
    async fn commit_status_if_current(
        &self,
        device_id: &str,
        expected_transient_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let (_, committed) = self
            .records
            .modify_if::<ShadowRecord, _>(device_id, |shadow| {
                if shadow.transient_id != expected_transient_id {
                    return false;
                }
                shadow.connection_status = status;
                shadow.status_updated = updated;
                true
            })
            .await?
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;

        if committed {
            debug!("connection status committed");
        } else {
            debug!("transient id moved on, status left untouched");
        }
        Ok(committed)
    }
}
