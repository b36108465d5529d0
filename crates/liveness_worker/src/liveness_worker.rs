use crate::domain::{
    ConfirmationService, LifecycleEventService, RediscoveryService, StalenessSweepService,
};
use crate::nats::{
    ConfirmationConsumerService, DeviceSeenConsumerService, LifecycleConsumerService,
    NatsConfirmationQueue, NatsNotifier,
};
use crate::sweep_scheduler::SweepScheduler;
use chrono::TimeDelta;
use common::domain::{DeviceRegistry, ShadowStore};
use common::nats::{
    ConsumeRequest, ConsumeResponse, ConsumerSettings, DelayedDeliveryLayer, JetStreamConsumer,
    JetStreamPublisher, NatsConsumeLoggingLayer, TowerConsumer,
};
use dagwatch_runner::AppProcess;
use std::sync::Arc;
use std::time::Duration;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;
use tracing::info;

type ConsumerStack = BoxCloneService<ConsumeRequest, ConsumeResponse, anyhow::Error>;

pub struct LivenessWorkerConfig {
    pub lifecycle_stream: String,
    pub lifecycle_subject: String,
    pub confirmation_stream: String,
    pub confirmation_subject: String,
    pub device_seen_stream: String,
    pub device_seen_subject: String,
    pub notification_stream: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub debounce_window: Duration,
    pub staleness_threshold: Duration,
    pub sweep_interval: Duration,
}

/// Collaborators the worker needs from the outside world
pub struct LivenessDependencies {
    pub shadows: Arc<dyn ShadowStore>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub consumer_client: Arc<dyn JetStreamConsumer>,
    pub publisher_client: Arc<dyn JetStreamPublisher>,
}

/// The device liveness engine: three NATS consumers and the sweep scheduler
pub struct LivenessWorker {
    lifecycle_consumer: TowerConsumer<ConsumerStack>,
    confirmation_consumer: TowerConsumer<ConsumerStack>,
    device_seen_consumer: TowerConsumer<ConsumerStack>,
    sweep_scheduler: SweepScheduler,
}

impl LivenessWorker {
    pub async fn new(deps: LivenessDependencies, config: LivenessWorkerConfig) -> anyhow::Result<Self> {
        info!("Initializing liveness worker");

        let debounce_window = TimeDelta::from_std(config.debounce_window)?;
        let staleness_threshold = TimeDelta::from_std(config.staleness_threshold)?;

        let notifier = Arc::new(NatsNotifier::new(
            deps.publisher_client.clone(),
            config.notification_stream.clone(),
        ));
        let confirmations = Arc::new(NatsConfirmationQueue::new(
            deps.publisher_client.clone(),
            config.confirmation_stream.clone(),
            debounce_window,
        ));

        let lifecycle_service = Arc::new(LifecycleEventService::new(
            deps.shadows.clone(),
            deps.registry.clone(),
            notifier.clone(),
            confirmations,
        ));
        let confirmation_service = Arc::new(ConfirmationService::new(
            deps.shadows.clone(),
            deps.registry.clone(),
            notifier.clone(),
        ));
        let rediscovery_service = Arc::new(RediscoveryService::new(
            deps.registry.clone(),
            notifier.clone(),
        ));
        let sweep_service = Arc::new(StalenessSweepService::new(
            deps.shadows,
            deps.registry,
            notifier,
            staleness_threshold,
        ));

        let settings = |stream: &str, consumer: &str, subject: &str| ConsumerSettings {
            stream_name: stream.to_string(),
            consumer_name: consumer.to_string(),
            subject_filter: subject.to_string(),
            batch_size: config.nats_batch_size,
            max_wait: Duration::from_secs(config.nats_batch_wait_secs),
        };

        let lifecycle_stack = BoxCloneService::new(
            ServiceBuilder::new()
                .layer(NatsConsumeLoggingLayer::new("lifecycle_router"))
                .service(LifecycleConsumerService::new(lifecycle_service)),
        );
        let lifecycle_consumer = TowerConsumer::new(
            deps.consumer_client.clone(),
            settings(
                &config.lifecycle_stream,
                "dagwatch-lifecycle-router",
                &config.lifecycle_subject,
            ),
            lifecycle_stack,
        )
        .await?;

        let confirmation_stack = BoxCloneService::new(
            ServiceBuilder::new()
                .layer(NatsConsumeLoggingLayer::new("confirmation_consumer"))
                .layer(DelayedDeliveryLayer::new())
                .service(ConfirmationConsumerService::new(confirmation_service)),
        );
        let confirmation_consumer = TowerConsumer::new(
            deps.consumer_client.clone(),
            settings(
                &config.confirmation_stream,
                "dagwatch-confirmation-consumer",
                &config.confirmation_subject,
            ),
            confirmation_stack,
        )
        .await?;

        let device_seen_stack = BoxCloneService::new(
            ServiceBuilder::new()
                .layer(NatsConsumeLoggingLayer::new("rediscovery"))
                .service(DeviceSeenConsumerService::new(rediscovery_service)),
        );
        let device_seen_consumer = TowerConsumer::new(
            deps.consumer_client,
            settings(
                &config.device_seen_stream,
                "dagwatch-rediscovery",
                &config.device_seen_subject,
            ),
            device_seen_stack,
        )
        .await?;

        let sweep_scheduler = SweepScheduler::new(sweep_service, config.sweep_interval);

        info!("Liveness worker initialized");

        Ok(Self {
            lifecycle_consumer,
            confirmation_consumer,
            device_seen_consumer,
            sweep_scheduler,
        })
    }

    /// Named runner processes, one per consumer plus the sweep scheduler
    pub fn into_runner_processes(self) -> Vec<(&'static str, AppProcess)> {
        let lifecycle_consumer = self.lifecycle_consumer;
        let lifecycle: AppProcess =
            Box::new(move |ctx| Box::pin(async move { lifecycle_consumer.run(ctx).await }));

        let confirmation_consumer = self.confirmation_consumer;
        let confirmation: AppProcess =
            Box::new(move |ctx| Box::pin(async move { confirmation_consumer.run(ctx).await }));

        let device_seen_consumer = self.device_seen_consumer;
        let rediscovery: AppProcess =
            Box::new(move |ctx| Box::pin(async move { device_seen_consumer.run(ctx).await }));

        let sweep_scheduler = self.sweep_scheduler;
        let sweep: AppProcess =
            Box::new(move |ctx| Box::pin(async move { sweep_scheduler.run(ctx).await }));

        vec![
            ("lifecycle_router", lifecycle),
            ("confirmation_consumer", confirmation),
            ("rediscovery", rediscovery),
            ("staleness_sweep", sweep),
        ]
    }
}
