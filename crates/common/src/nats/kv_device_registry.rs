use crate::domain::{Device, DeviceRegistry, DomainError, DomainResult};
use crate::nats::{JsonBucket, KeyValueBucket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Device registry kept as JSON records in a JetStream key-value bucket
pub struct KvDeviceRegistry {
    records: JsonBucket,
}

impl KvDeviceRegistry {
    pub fn new(bucket: Arc<dyn KeyValueBucket>) -> Self {
        Self {
            records: JsonBucket::new(bucket),
        }
    }
}

#[async_trait]
impl DeviceRegistry for KvDeviceRegistry {
    #[instrument(skip_all, fields(device_id = %device_id))]
    async fn get(&self, device_id: &str) -> DomainResult<Device> {
        self.records
            .get::<Device>(device_id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }

    #[instrument(skip_all)]
    async fn list_visible(&self) -> DomainResult<Vec<Device>> {
        let mut keys = self.records.keys().await?;
        keys.sort();

        let mut visible = Vec::new();
        for key in keys {
            // a key can vanish between listing and reading
            match self.records.get::<Device>(&key).await? {
                Some(device) if device.visible => visible.push(device),
                Some(_) => {}
                None => warn!(device_id = %key, "device disappeared while listing"),
            }
        }

        debug!(count = visible.len(), "listed visible devices");
        Ok(visible)
    }

    #[instrument(skip_all, fields(device_id = %device_id, visible = visible))]
    async fn set_visibility(&self, device_id: &str, visible: bool) -> DomainResult<bool> {
        let (_, changed) = self
            .records
            .modify_if::<Device, _>(device_id, |device| {
                if device.visible == visible {
                    return false;
                }
                device.visible = visible;
                true
            })
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;

        if !changed {
            debug!("visibility flag already set");
        }
        Ok(changed)
    }

    #[instrument(skip_all, fields(device_id = %device_id, seen_at = %seen_at))]
    async fn record_seen(&self, device_id: &str, seen_at: DateTime<Utc>) -> DomainResult<bool> {
        let mut flipped = false;
        self.records
            .modify_if::<Device, _>(device_id, |device| {
                flipped = !device.visible;
                let advances = device.last_seen.map_or(true, |last| last < seen_at);
                if !flipped && !advances {
                    return false;
                }
                device.visible = true;
                if advances {
                    device.last_seen = Some(seen_at);
                }
                true
            })
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;

        Ok(flipped)
    }
}
