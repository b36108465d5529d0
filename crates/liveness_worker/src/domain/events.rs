use crate::domain::timestamp_from_millis;
use common::domain::{
    ConfirmationMessage, ConnectionStatus, ConnectivityEvent, DeviceSeenEvent, DomainError,
    DomainResult,
};
use common::garde::{validate_device_id, validate_struct};
use garde::Validate;
use serde::Deserialize;

/// Connectivity transition as published by the device telemetry bridge
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityEventPayload {
    #[garde(custom(validate_device_id))]
    pub device_id: String,
    #[garde(skip)]
    pub event_type: String,
    #[garde(skip)]
    pub timestamp_millis: i64,
}

/// Heartbeat published whenever a device reports in
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSeenPayload {
    #[garde(custom(validate_device_id))]
    pub device_id: String,
    #[garde(skip)]
    pub timestamp_millis: i64,
}

/// Decode and validate a raw connectivity event.
/// Anything unusable is reported as `MalformedEvent`.
pub fn decode_connectivity_event(payload: &[u8]) -> DomainResult<ConnectivityEvent> {
    let raw: ConnectivityEventPayload = serde_json::from_slice(payload)
        .map_err(|e| DomainError::MalformedEvent(format!("invalid JSON: {}", e)))?;

    validate_struct(&raw).map_err(|e| DomainError::MalformedEvent(e.to_string()))?;

    Ok(ConnectivityEvent {
        event_type: raw.event_type.parse::<ConnectionStatus>()?,
        occurred_at: timestamp_from_millis(raw.timestamp_millis)?,
        device_id: raw.device_id,
    })
}

/// Decode and validate a redelivered confirmation message.
/// Anything unusable is reported as `MalformedMessage`.
pub fn decode_confirmation_message(payload: &[u8]) -> DomainResult<ConfirmationMessage> {
    let message: ConfirmationMessage = serde_json::from_slice(payload)
        .map_err(|e| DomainError::MalformedMessage(format!("invalid JSON: {}", e)))?;

    validate_struct(&message).map_err(|e| DomainError::MalformedMessage(e.to_string()))?;

    Ok(message)
}

/// Decode and validate a device-seen heartbeat
pub fn decode_device_seen_event(payload: &[u8]) -> DomainResult<DeviceSeenEvent> {
    let raw: DeviceSeenPayload = serde_json::from_slice(payload)
        .map_err(|e| DomainError::MalformedEvent(format!("invalid JSON: {}", e)))?;

    validate_struct(&raw).map_err(|e| DomainError::MalformedEvent(e.to_string()))?;

    Ok(DeviceSeenEvent {
        last_seen: timestamp_from_millis(raw.timestamp_millis)?,
        device_id: raw.device_id,
    })
}
