use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Batch size for consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Stream carrying raw connect/disconnect events
    #[serde(default = "default_lifecycle_stream")]
    pub lifecycle_stream: String,

    #[serde(default = "default_lifecycle_subject")]
    pub lifecycle_subject: String,

    /// Stream backing the disconnect confirmation delay queue
    #[serde(default = "default_confirmation_stream")]
    pub confirmation_stream: String,

    #[serde(default = "default_confirmation_subject")]
    pub confirmation_subject: String,

    /// Stream carrying device-seen events from the rediscovery path
    #[serde(default = "default_device_seen_stream")]
    pub device_seen_stream: String,

    #[serde(default = "default_device_seen_subject")]
    pub device_seen_subject: String,

    /// Stream the visibility notifications are published to
    #[serde(default = "default_notification_stream")]
    pub notification_stream: String,

    /// Key-value bucket holding device shadows
    #[serde(default = "default_shadow_bucket")]
    pub shadow_bucket: String,

    /// Key-value bucket holding the device registry
    #[serde(default = "default_registry_bucket")]
    pub registry_bucket: String,

    // Liveness configuration
    /// How long a disconnect must stand before it is confirmed
    #[serde(default = "default_debounce_window_secs")]
    pub debounce_window_secs: u64,

    /// Silence after which the sweep demotes a visible device
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_lifecycle_stream() -> String {
    "device_lifecycle".to_string()
}

fn default_lifecycle_subject() -> String {
    "device_lifecycle.>".to_string()
}

fn default_confirmation_stream() -> String {
    "liveness_confirmations".to_string()
}

fn default_confirmation_subject() -> String {
    "liveness_confirmations.>".to_string()
}

fn default_device_seen_stream() -> String {
    "device_seen".to_string()
}

fn default_device_seen_subject() -> String {
    "device_seen.>".to_string()
}

fn default_notification_stream() -> String {
    "visibility_notifications".to_string()
}

fn default_shadow_bucket() -> String {
    "device_shadows".to_string()
}

fn default_registry_bucket() -> String {
    "device_registry".to_string()
}

// Liveness defaults
fn default_debounce_window_secs() -> u64 {
    30
}

fn default_staleness_threshold_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    300
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "dagwatch-all-in-one".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("DAGWATCH"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("debounce_window_secs", self.debounce_window_secs),
            ("staleness_threshold_secs", self.staleness_threshold_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("nats_batch_wait_secs", self.nats_batch_wait_secs),
        ];
        for (key, value) in windows {
            if value == 0 {
                return Err(ConfigError::Message(format!("{} must be greater than zero", key)));
            }
        }
        if self.nats_batch_size == 0 {
            return Err(ConfigError::Message(
                "nats_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_window_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
