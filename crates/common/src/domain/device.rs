use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry entry for a provisioned device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub account_id: String,
    /// Confirmed, debounced liveness flag. The sweep and the notifiers treat
    /// this as the record of what the account was last told.
    pub visible: bool,
    /// Latest device-seen timestamp from the rediscovery path
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device '{}' ('{}')", self.device_id, self.name)
    }
}

/// Repository trait for the device registry
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Get a device by ID
    async fn get(&self, device_id: &str) -> DomainResult<Device>;

    /// List every device currently flagged visible
    async fn list_visible(&self) -> DomainResult<Vec<Device>>;

    /// Set the confirmed visibility flag as a compare-and-swap.
    /// Returns `true` only if the stored flag actually changed.
    async fn set_visibility(&self, device_id: &str, visible: bool) -> DomainResult<bool>;

    /// Record that the device was seen at `seen_at` and flag it visible.
    /// `last_seen` only moves forward. Returns `true` only if the flag flipped.
    async fn record_seen(&self, device_id: &str, seen_at: DateTime<Utc>) -> DomainResult<bool>;
}
