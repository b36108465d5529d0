use crate::domain::device::Device;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility status change addressed to the owning account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityNotification {
    pub account_id: String,
    pub device_id: String,
    pub device_name: String,
    pub timestamp: DateTime<Utc>,
    /// `true` when the device was found again, `false` when it went missing
    pub status: bool,
}

impl VisibilityNotification {
    pub fn for_device(device: &Device, timestamp: DateTime<Utc>, status: bool) -> Self {
        Self {
            account_id: device.account_id.clone(),
            device_id: device.device_id.clone(),
            device_name: device.name.clone(),
            timestamp,
            status,
        }
    }
}

/// Sends visibility notifications to an account's verified addresses.
/// Implementations report failures as `DomainError::DeliveryFailure`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &VisibilityNotification) -> DomainResult<()>;
}
