use crate::domain::commit_visibility;
use common::domain::{
    ConfirmationMessage, ConfirmationQueue, ConnectionStatus, ConnectivityEvent, DeviceRegistry,
    DomainResult, Notifier, ShadowStore,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What the router did with a connectivity event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Event repeats the committed status; only the transient id moved
    Duplicate,
    /// Reconnect committed immediately
    Reconnected { notified: bool },
    /// Disconnect deferred until the debounce window has passed
    ConfirmationScheduled { transient_id: String },
}

/// Debounces raw connectivity transitions.
///
/// Reconnects are trusted straight away. Disconnects are only asserted: a
/// confirmation message goes onto the delay queue and wins only if no other
/// event for the device arrives before it comes back.
pub struct LifecycleEventService {
    shadows: Arc<dyn ShadowStore>,
    registry: Arc<dyn DeviceRegistry>,
    notifier: Arc<dyn Notifier>,
    confirmations: Arc<dyn ConfirmationQueue>,
}

impl LifecycleEventService {
    pub fn new(
        shadows: Arc<dyn ShadowStore>,
        registry: Arc<dyn DeviceRegistry>,
        notifier: Arc<dyn Notifier>,
        confirmations: Arc<dyn ConfirmationQueue>,
    ) -> Self {
        Self {
            shadows,
            registry,
            notifier,
            confirmations,
        }
    }

    #[instrument(skip(self, event), fields(device_id = %event.device_id, event_type = %event.event_type))]
    pub async fn handle_event(&self, event: ConnectivityEvent) -> DomainResult<LifecycleOutcome> {
        // every raw event supersedes whatever confirmation is in flight
        let transient_id = xid::new().to_string();
        self.shadows
            .set_transient_id(&event.device_id, &transient_id)
            .await?;

        let shadow = self.shadows.get(&event.device_id).await?;
        if shadow.connection_status == event.event_type {
            debug!(
                status = %shadow.connection_status,
                "event matches committed status, nothing to do"
            );
            return Ok(LifecycleOutcome::Duplicate);
        }

        match event.event_type {
            ConnectionStatus::Connected => {
                let notified = self.commit_reconnect(&event).await?;
                Ok(LifecycleOutcome::Reconnected { notified })
            }
            ConnectionStatus::Disconnected => {
                let message = ConfirmationMessage {
                    device_id: event.device_id.clone(),
                    transient_id: transient_id.clone(),
                    event_time: event.occurred_at,
                    asserted_status: ConnectionStatus::Disconnected,
                };
                self.confirmations.enqueue(&message).await?;

                debug!(transient_id = %transient_id, "disconnect confirmation scheduled");
                Ok(LifecycleOutcome::ConfirmationScheduled { transient_id })
            }
        }
    }

    async fn commit_reconnect(&self, event: &ConnectivityEvent) -> DomainResult<bool> {
        self.shadows
            .set_connection_status(
                &event.device_id,
                ConnectionStatus::Connected,
                event.occurred_at,
            )
            .await?;

        let device = self.registry.get(&event.device_id).await?;
        if device.visible {
            debug!("device already visible");
            return Ok(false);
        }

        let notified = commit_visibility(
            self.registry.as_ref(),
            self.notifier.as_ref(),
            &device,
            true,
            event.occurred_at,
        )
        .await?;
        if notified {
            info!("device reconnected");
        }

        Ok(notified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use common::domain::{
        Device, DomainError, MockConfirmationQueue, MockDeviceRegistry, MockNotifier,
        MockShadowStore, ShadowRecord, VisibilityNotification,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn shadow(status: ConnectionStatus) -> ShadowRecord {
        ShadowRecord {
            connection_status: status,
            status_updated: at(0),
            transient_id: "stamped".to_string(),
            transient_updated: at(0),
        }
    }

    fn device(visible: bool) -> Device {
        Device {
            device_id: "dag-01".to_string(),
            name: "Garage".to_string(),
            account_id: "acct-1".to_string(),
            visible,
            last_seen: None,
        }
    }

    fn event(event_type: ConnectionStatus, secs: i64) -> ConnectivityEvent {
        ConnectivityEvent {
            device_id: "dag-01".to_string(),
            event_type,
            occurred_at: at(secs),
        }
    }

    struct Mocks {
        shadows: MockShadowStore,
        registry: MockDeviceRegistry,
        notifier: MockNotifier,
        queue: MockConfirmationQueue,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                shadows: MockShadowStore::new(),
                registry: MockDeviceRegistry::new(),
                notifier: MockNotifier::new(),
                queue: MockConfirmationQueue::new(),
            }
        }

        fn with_shadow(mut self, status: ConnectionStatus) -> Self {
            self.shadows
                .expect_set_transient_id()
                .times(1)
                .returning(|_, _| Ok(()));
            self.shadows
                .expect_get()
                .times(1)
                .returning(move |_| Ok(shadow(status)));
            self
        }

        fn into_service(self) -> LifecycleEventService {
            LifecycleEventService::new(
                Arc::new(self.shadows),
                Arc::new(self.registry),
                Arc::new(self.notifier),
                Arc::new(self.queue),
            )
        }
    }

    #[tokio::test]
    async fn test_repeated_status_is_duplicate() {
        // Arrange
        let mut mocks = Mocks::new().with_shadow(ConnectionStatus::Connected);
        mocks.shadows.expect_set_connection_status().times(0);
        mocks.queue.expect_enqueue().times(0);
        mocks.notifier.expect_send().times(0);
        let service = mocks.into_service();

        // Act
        let outcome = service
            .handle_event(event(ConnectionStatus::Connected, 5))
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, LifecycleOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_disconnect_enqueues_confirmation_with_fresh_transient_id() {
        // Arrange
        let mut mocks = Mocks::new();
        let stamped = Arc::new(std::sync::Mutex::new(String::new()));
        let stamped_write = stamped.clone();
        mocks
            .shadows
            .expect_set_transient_id()
            .times(1)
            .returning(move |_, id| {
                *stamped_write.lock().unwrap() = id.to_string();
                Ok(())
            });
        mocks
            .shadows
            .expect_get()
            .returning(|_| Ok(shadow(ConnectionStatus::Connected)));
        mocks.shadows.expect_set_connection_status().times(0);
        let stamped_check = stamped.clone();
        mocks
            .queue
            .expect_enqueue()
            .withf(move |m: &ConfirmationMessage| {
                m.device_id == "dag-01"
                    && m.transient_id == *stamped_check.lock().unwrap()
                    && m.event_time == at(0)
                    && m.asserted_status == ConnectionStatus::Disconnected
            })
            .times(1)
            .returning(|_| Ok(()));
        mocks.notifier.expect_send().times(0);
        let service = mocks.into_service();

        // Act
        let outcome = service
            .handle_event(event(ConnectionStatus::Disconnected, 0))
            .await
            .unwrap();

        // Assert
        let expected = stamped.lock().unwrap().clone();
        assert!(!expected.is_empty());
        assert_eq!(
            outcome,
            LifecycleOutcome::ConfirmationScheduled {
                transient_id: expected
            }
        );
    }

    #[tokio::test]
    async fn test_reconnect_of_hidden_device_commits_and_notifies() {
        // Arrange
        let mut mocks = Mocks::new().with_shadow(ConnectionStatus::Disconnected);
        mocks
            .shadows
            .expect_set_connection_status()
            .withf(|id: &str, status: &ConnectionStatus, ts: &DateTime<Utc>| {
                id == "dag-01" && *status == ConnectionStatus::Connected && *ts == at(10)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
            .registry
            .expect_get()
            .returning(|_| Ok(device(false)));
        mocks
            .registry
            .expect_set_visibility()
            .withf(|_, visible: &bool| *visible)
            .times(1)
            .returning(|_, _| Ok(true));
        mocks
            .notifier
            .expect_send()
            .withf(|n: &VisibilityNotification| n.status && n.timestamp == at(10))
            .times(1)
            .returning(|_| Ok(()));
        mocks.queue.expect_enqueue().times(0);
        let service = mocks.into_service();

        // Act
        let outcome = service
            .handle_event(event(ConnectionStatus::Connected, 10))
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, LifecycleOutcome::Reconnected { notified: true });
    }

    #[tokio::test]
    async fn test_reconnect_of_visible_device_does_not_notify() {
        // Arrange
        let mut mocks = Mocks::new().with_shadow(ConnectionStatus::Disconnected);
        mocks
            .shadows
            .expect_set_connection_status()
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks.registry.expect_get().returning(|_| Ok(device(true)));
        mocks.registry.expect_set_visibility().times(0);
        mocks.notifier.expect_send().times(0);
        let service = mocks.into_service();

        // Act
        let outcome = service
            .handle_event(event(ConnectionStatus::Connected, 10))
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, LifecycleOutcome::Reconnected { notified: false });
    }

    #[tokio::test]
    async fn test_reconnect_racing_rediscovery_does_not_notify_twice() {
        // Arrange
        let mut mocks = Mocks::new().with_shadow(ConnectionStatus::Disconnected);
        mocks
            .shadows
            .expect_set_connection_status()
            .returning(|_, _, _| Ok(()));
        mocks
            .registry
            .expect_get()
            .returning(|_| Ok(device(false)));
        // rediscovery flipped the flag after the registry read
        mocks
            .registry
            .expect_set_visibility()
            .times(1)
            .returning(|_, _| Ok(false));
        mocks.notifier.expect_send().times(0);
        let service = mocks.into_service();

        // Act
        let outcome = service
            .handle_event(event(ConnectionStatus::Connected, 10))
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, LifecycleOutcome::Reconnected { notified: false });
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_surfaced() {
        // Arrange
        let mut mocks = Mocks::new();
        mocks
            .shadows
            .expect_set_transient_id()
            .returning(|_, _| Err(DomainError::DependencyUnavailable(anyhow::anyhow!("kv down"))));
        mocks.shadows.expect_get().times(0);
        let service = mocks.into_service();

        // Act
        let result = service
            .handle_event(event(ConnectionStatus::Disconnected, 0))
            .await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_surfaced() {
        // Arrange
        let mut mocks = Mocks::new().with_shadow(ConnectionStatus::Connected);
        mocks
            .queue
            .expect_enqueue()
            .returning(|_| Err(DomainError::DependencyUnavailable(anyhow::anyhow!("no ack"))));
        let service = mocks.into_service();

        // Act
        let result = service
            .handle_event(event(ConnectionStatus::Disconnected, 0))
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::DependencyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unknown_shadow_is_reported() {
        // Arrange
        let mut mocks = Mocks::new();
        mocks
            .shadows
            .expect_set_transient_id()
            .returning(|id, _| Err(DomainError::ShadowNotFound(id.to_string())));
        let service = mocks.into_service();

        // Act
        let result = service
            .handle_event(event(ConnectionStatus::Connected, 0))
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::ShadowNotFound(_))));
    }
}
