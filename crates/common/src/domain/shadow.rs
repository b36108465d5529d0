use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw connection status as last committed on the device shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }

    /// Visibility flag implied by this status once it has been confirmed
    pub fn is_visible(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            other => Err(DomainError::MalformedEvent(format!(
                "unrecognized connection status: {:?}",
                other
            ))),
        }
    }
}

/// Latest known state of a device.
///
/// `transient_id` is restamped on every raw lifecycle event, while
/// `connection_status` and `status_updated` only move when a status commit
/// happens (directly for reconnects, after debouncing for disconnects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowRecord {
    pub connection_status: ConnectionStatus,
    pub status_updated: DateTime<Utc>,
    pub transient_id: String,
    pub transient_updated: DateTime<Utc>,
}

/// Repository trait for the device shadow.
/// Every write touches only the named fields; implementations must not let
/// concurrent writers clobber each other's fields.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ShadowStore: Send + Sync {
    /// Fetch the shadow record for a device
    async fn get(&self, device_id: &str) -> DomainResult<ShadowRecord>;

    /// Stamp the transient correlation id (and its timestamp)
    async fn set_transient_id(&self, device_id: &str, transient_id: &str) -> DomainResult<()>;

    /// Commit a debounced connection status
    async fn set_connection_status(
        &self,
        device_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Commit a debounced connection status only while the shadow still
    /// carries `expected_transient_id`. The check and the write are one
    /// atomic step. Returns `false`, writing nothing, when a newer lifecycle
    /// event has restamped the transient id.
    async fn commit_status_if_current(
        &self,
        device_id: &str,
        expected_transient_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<bool>;
}
