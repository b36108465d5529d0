use crate::domain::{commit_visibility, is_stale};
use chrono::{DateTime, TimeDelta, Utc};
use common::domain::{Device, DeviceRegistry, DomainResult, Notifier, ShadowStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tally of a single sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Devices returned by the registry listing
    pub scanned: usize,
    /// Devices demoted to not visible
    pub lost: usize,
    /// Devices listed but already not visible by the time they were checked
    pub skipped: usize,
    /// Devices whose check failed; retried on the next sweep
    pub failed: usize,
}

enum DeviceCheck {
    Fresh,
    Demoted,
    /// Stale, but another writer hid it after the listing
    AlreadyHidden,
}

/// Catches devices that went silent without a disconnect ever being reported
pub struct StalenessSweepService {
    shadows: Arc<dyn ShadowStore>,
    registry: Arc<dyn DeviceRegistry>,
    notifier: Arc<dyn Notifier>,
    threshold: TimeDelta,
}

impl StalenessSweepService {
    pub fn new(
        shadows: Arc<dyn ShadowStore>,
        registry: Arc<dyn DeviceRegistry>,
        notifier: Arc<dyn Notifier>,
        threshold: TimeDelta,
    ) -> Self {
        Self {
            shadows,
            registry,
            notifier,
            threshold,
        }
    }

    /// Demote every visible device whose committed status is older than the
    /// staleness threshold at `now`. One device failing does not stop the
    /// sweep; failing to list devices does.
    #[instrument(skip(self), fields(threshold_secs = self.threshold.num_seconds()))]
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> DomainResult<SweepReport> {
        let devices = self.registry.list_visible().await?;
        let mut report = SweepReport::default();

        for device in devices {
            report.scanned += 1;

            if !device.visible {
                report.skipped += 1;
                continue;
            }

            match self.check_device(&device, now).await {
                Ok(DeviceCheck::Demoted) => report.lost += 1,
                Ok(DeviceCheck::AlreadyHidden) => report.skipped += 1,
                Ok(DeviceCheck::Fresh) => {}
                Err(e) => {
                    warn!(device_id = %device.device_id, error = %e, "staleness check failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            lost = report.lost,
            skipped = report.skipped,
            failed = report.failed,
            "staleness sweep finished"
        );
        Ok(report)
    }

    async fn check_device(&self, device: &Device, now: DateTime<Utc>) -> DomainResult<DeviceCheck> {
        let shadow = self.shadows.get(&device.device_id).await?;
        if !is_stale(shadow.status_updated, now, self.threshold) {
            return Ok(DeviceCheck::Fresh);
        }

        debug!(
            device_id = %device.device_id,
            status_updated = %shadow.status_updated,
            "device has gone stale"
        );
        let demoted = commit_visibility(
            self.registry.as_ref(),
            self.notifier.as_ref(),
            device,
            false,
            shadow.status_updated,
        )
        .await?;

        Ok(if demoted {
            DeviceCheck::Demoted
        } else {
            DeviceCheck::AlreadyHidden
        })
    }
}
