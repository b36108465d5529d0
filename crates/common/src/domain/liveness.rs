use crate::domain::result::DomainResult;
use crate::domain::shadow::ConnectionStatus;
use crate::garde::validate_device_id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Raw connectivity transition reported by device telemetry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub device_id: String,
    pub event_type: ConnectionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Heartbeat-style signal that a device has been seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSeenEvent {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
}

/// Deferred status assertion carried by the delay queue.
///
/// Only valid while the shadow's transient id still equals `transient_id`;
/// any raw event for the device after enqueue supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationMessage {
    #[garde(custom(validate_device_id))]
    pub device_id: String,
    #[garde(length(min = 1, max = 64))]
    pub transient_id: String,
    #[garde(skip)]
    pub event_time: DateTime<Utc>,
    #[garde(skip)]
    pub asserted_status: ConnectionStatus,
}

/// Delay queue producer: the message comes back to the confirmation
/// consumer once the debounce window has elapsed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ConfirmationQueue: Send + Sync {
    async fn enqueue(&self, message: &ConfirmationMessage) -> DomainResult<()>;
}
