use crate::domain::announce_visibility;
use common::domain::{DeviceRegistry, DeviceSeenEvent, DomainResult, Notifier};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What the re-discovery handler did with a device-seen signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RediscoveryOutcome {
    /// Device was already visible, or another writer restored it first
    AlreadyVisible,
    /// Device was lost; it is visible again and its account was told
    Rediscovered,
}

/// Brings a device back once it reports in after being marked lost
pub struct RediscoveryService {
    registry: Arc<dyn DeviceRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl RediscoveryService {
    pub fn new(registry: Arc<dyn DeviceRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }

    #[instrument(skip(self, event), fields(device_id = %event.device_id, last_seen = %event.last_seen))]
    pub async fn handle_seen(&self, event: DeviceSeenEvent) -> DomainResult<RediscoveryOutcome> {
        let device = self.registry.get(&event.device_id).await?;
        if device.visible {
            debug!("device already visible");
            return Ok(RediscoveryOutcome::AlreadyVisible);
        }

        // the flag only flips for one writer, so only one of them notifies
        if !self.registry.record_seen(&event.device_id, event.last_seen).await? {
            debug!("device restored by another writer");
            return Ok(RediscoveryOutcome::AlreadyVisible);
        }

        info!("lost device seen again");
        announce_visibility(self.notifier.as_ref(), &device, true, event.last_seen).await?;

        Ok(RediscoveryOutcome::Rediscovered)
    }
}
