//! In-memory collaborators for exercising the liveness services without NATS.

use crate::domain::{
    ConfirmationMessage, ConfirmationQueue, ConnectionStatus, Device, DeviceRegistry,
    DomainError, DomainResult, Notifier, ShadowRecord, ShadowStore, VisibilityNotification,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of ShadowStore using HashMap
#[derive(Clone, Default)]
pub struct InMemoryShadowStore {
    records: Arc<RwLock<HashMap<String, ShadowRecord>>>,
}

impl InMemoryShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a shadow record, replacing any existing one
    pub async fn insert(&self, device_id: &str, record: ShadowRecord) {
        self.records
            .write()
            .await
            .insert(device_id.to_string(), record);
    }
}

#[async_trait]
impl ShadowStore for InMemoryShadowStore {
    async fn get(&self, device_id: &str) -> DomainResult<ShadowRecord> {
        self.records
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))
    }

    async fn set_transient_id(&self, device_id: &str, transient_id: &str) -> DomainResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(device_id)
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;
        record.transient_id = transient_id.to_string();
        record.transient_updated = Utc::now();
        Ok(())
    }

    async fn set_connection_status(
        &self,
        device_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(device_id)
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;
        record.connection_status = status;
        record.status_updated = updated;
        Ok(())
    }

    async fn commit_status_if_current(
        &self,
        device_id: &str,
        expected_transient_id: &str,
        status: ConnectionStatus,
        updated: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(device_id)
            .ok_or_else(|| DomainError::ShadowNotFound(device_id.to_string()))?;
        if record.transient_id != expected_transient_id {
            return Ok(false);
        }
        record.connection_status = status;
        record.status_updated = updated;
        Ok(true)
    }
}

/// In-memory implementation of DeviceRegistry using HashMap
#[derive(Clone, Default)]
pub struct InMemoryDeviceRegistry {
    devices: Arc<RwLock<HashMap<String, Device>>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a device, replacing any existing one
    pub async fn insert(&self, device: Device) {
        self.devices
            .write()
            .await
            .insert(device.device_id.clone(), device);
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn get(&self, device_id: &str) -> DomainResult<Device> {
        self.devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }

    async fn list_visible(&self) -> DomainResult<Vec<Device>> {
        let devices = self.devices.read().await;
        let mut visible: Vec<Device> = devices.values().filter(|d| d.visible).cloned().collect();
        visible.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(visible)
    }

    async fn set_visibility(&self, device_id: &str, visible: bool) -> DomainResult<bool> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;
        if device.visible == visible {
            return Ok(false);
        }
        device.visible = visible;
        Ok(true)
    }

    async fn record_seen(&self, device_id: &str, seen_at: DateTime<Utc>) -> DomainResult<bool> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;
        if device.last_seen.map_or(true, |last| last < seen_at) {
            device.last_seen = Some(seen_at);
        }
        let flipped = !device.visible;
        device.visible = true;
        Ok(flipped)
    }
}

/// Notifier that records every notification it is asked to send
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<VisibilityNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<VisibilityNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &VisibilityNotification) -> DomainResult<()> {
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}

/// Delay queue stand-in; tests drain it to simulate redelivery after the window
#[derive(Clone, Default)]
pub struct RecordingConfirmationQueue {
    pending: Arc<RwLock<Vec<ConfirmationMessage>>>,
}

impl RecordingConfirmationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every message enqueued so far, oldest first
    pub async fn drain(&self) -> Vec<ConfirmationMessage> {
        std::mem::take(&mut *self.pending.write().await)
    }
}

#[async_trait]
impl ConfirmationQueue for RecordingConfirmationQueue {
    async fn enqueue(&self, message: &ConfirmationMessage) -> DomainResult<()> {
        self.pending.write().await.push(message.clone());
        Ok(())
    }
}
