mod config;

use common::nats::{KvDeviceRegistry, KvShadowStore, NatsClient};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::ServiceConfig;
use dagwatch_runner::Runner;
use liveness_worker::{LivenessDependencies, LivenessWorker, LivenessWorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        debounce_window_secs = config.debounce_window_secs,
        staleness_threshold_secs = config.staleness_threshold_secs,
        "Starting dagwatch-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize NATS: {:#}", e);
            std::process::exit(1);
        }
    };

    let deps = match build_dependencies(&nats_client, &config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to open device stores: {:#}", e);
            std::process::exit(1);
        }
    };

    let liveness_worker = match LivenessWorker::new(
        deps,
        LivenessWorkerConfig {
            lifecycle_stream: config.lifecycle_stream.clone(),
            lifecycle_subject: config.lifecycle_subject.clone(),
            confirmation_stream: config.confirmation_stream.clone(),
            confirmation_subject: config.confirmation_subject.clone(),
            device_seen_stream: config.device_seen_stream.clone(),
            device_seen_subject: config.device_seen_subject.clone(),
            notification_stream: config.notification_stream.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            debounce_window: config.debounce_window(),
            staleness_threshold: config.staleness_threshold(),
            sweep_interval: config.sweep_interval(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize liveness worker: {:#}", e);
            std::process::exit(1);
        }
    };

    // Build runner with all processes
    let mut runner = Runner::new();
    for (name, process) in liveness_worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner = runner
        .with_closer(move || {
            Box::pin(async move {
                info!("Running cleanup tasks...");
                nats_client.close().await;

                // Shutdown telemetry and flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            })
        })
        .with_closer_timeout(Duration::from_secs(10));

    if let Err(e) = runner.run().await {
        eprintln!("dagwatch-all-in-one exited with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<NatsClient> {
    info!("Initializing NATS...");
    let client = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await?;

    client
        .ensure_stream(&config.lifecycle_stream, "Raw device connect/disconnect events")
        .await?;
    client
        .ensure_stream(
            &config.confirmation_stream,
            "Deferred disconnect confirmations",
        )
        .await?;
    client
        .ensure_stream(&config.device_seen_stream, "Device-seen events")
        .await?;
    client
        .ensure_stream(
            &config.notification_stream,
            "Visibility notifications for account holders",
        )
        .await?;

    Ok(client)
}

async fn build_dependencies(
    client: &NatsClient,
    config: &ServiceConfig,
) -> anyhow::Result<LivenessDependencies> {
    let shadow_bucket = client.key_value_bucket(&config.shadow_bucket).await?;
    let registry_bucket = client.key_value_bucket(&config.registry_bucket).await?;

    Ok(LivenessDependencies {
        shadows: Arc::new(KvShadowStore::new(shadow_bucket)),
        registry: Arc::new(KvDeviceRegistry::new(registry_bucket)),
        consumer_client: client.create_consumer_client(),
        publisher_client: client.create_publisher_client(),
    })
}
