use chrono::{DateTime, Utc};
use common::domain::{Device, DeviceRegistry, DomainResult, Notifier, VisibilityNotification};
use tracing::{debug, info, warn};

/// Flip a device's confirmed visibility flag, then tell its account.
///
/// The flag write is a compare-and-swap against the stored registry entry,
/// not against `device`, which may be a stale snapshot. When another writer
/// already moved the flag to `visible`, nothing is sent and `Ok(false)` is
/// returned. A failed notification leaves the new flag in place and is
/// returned as `DeliveryFailure`.
pub async fn commit_visibility(
    registry: &dyn DeviceRegistry,
    notifier: &dyn Notifier,
    device: &Device,
    visible: bool,
    timestamp: DateTime<Utc>,
) -> DomainResult<bool> {
    if !registry.set_visibility(&device.device_id, visible).await? {
        debug!(
            device_id = %device.device_id,
            visible,
            "visibility already committed elsewhere, not notifying"
        );
        return Ok(false);
    }

    announce_visibility(notifier, device, visible, timestamp).await?;
    Ok(true)
}

/// Send the notification for a flag transition that has already been written
pub async fn announce_visibility(
    notifier: &dyn Notifier,
    device: &Device,
    visible: bool,
    timestamp: DateTime<Utc>,
) -> DomainResult<()> {
    info!(
        device_id = %device.device_id,
        account_id = %device.account_id,
        visible,
        "device visibility changed"
    );

    let notification = VisibilityNotification::for_device(device, timestamp, visible);
    if let Err(e) = notifier.send(&notification).await {
        warn!(
            device_id = %device.device_id,
            account_id = %device.account_id,
            error = %e,
            "visibility committed but notification failed"
        );
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockDeviceRegistry, MockNotifier};
    use mockall::Sequence;

    fn device() -> Device {
        Device {
            device_id: "dag-01".to_string(),
            name: "Garage".to_string(),
            account_id: "acct-1".to_string(),
            visible: true,
            last_seen: None,
        }
    }

    #[tokio::test]
    async fn test_flag_is_written_before_notification() {
        // Arrange
        let ts = DateTime::from_timestamp(42, 0).unwrap();
        let mut seq = Sequence::new();
        let mut registry = MockDeviceRegistry::new();
        let mut notifier = MockNotifier::new();
        registry
            .expect_set_visibility()
            .withf(|id: &str, visible: &bool| id == "dag-01" && !*visible)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        notifier
            .expect_send()
            .withf(move |n: &VisibilityNotification| {
                n.account_id == "acct-1" && n.device_name == "Garage" && !n.status && n.timestamp == ts
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        // Act
        let notified = commit_visibility(&registry, &notifier, &device(), false, ts)
            .await
            .unwrap();

        // Assert
        assert!(notified);
    }

    #[tokio::test]
    async fn test_flag_already_flipped_elsewhere_is_not_announced() {
        // Arrange
        let mut registry = MockDeviceRegistry::new();
        let mut notifier = MockNotifier::new();
        // the snapshot says visible, the store already says hidden
        registry
            .expect_set_visibility()
            .times(1)
            .returning(|_, _| Ok(false));
        notifier.expect_send().times(0);

        // Act
        let notified = commit_visibility(&registry, &notifier, &device(), false, Utc::now())
            .await
            .unwrap();

        // Assert
        assert!(!notified);
    }

    #[tokio::test]
    async fn test_flag_write_failure_skips_notification() {
        // Arrange
        let mut registry = MockDeviceRegistry::new();
        let mut notifier = MockNotifier::new();
        registry
            .expect_set_visibility()
            .returning(|_, _| Err(DomainError::DependencyUnavailable(anyhow::anyhow!("kv down"))));
        notifier.expect_send().times(0);

        // Act
        let result = commit_visibility(&registry, &notifier, &device(), false, Utc::now()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::DependencyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_notification_failure_is_reported() {
        // Arrange
        let mut registry = MockDeviceRegistry::new();
        let mut notifier = MockNotifier::new();
        registry.expect_set_visibility().times(1).returning(|_, _| Ok(true));
        notifier
            .expect_send()
            .returning(|_| Err(DomainError::DeliveryFailure("stream missing".to_string())));

        // Act
        let result = commit_visibility(&registry, &notifier, &device(), true, Utc::now()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::DeliveryFailure(_))));
    }
}
