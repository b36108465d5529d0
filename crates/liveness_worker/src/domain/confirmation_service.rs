use crate::domain::commit_visibility;
use common::domain::{
    ConfirmationMessage, DeviceRegistry, DomainResult, Notifier, ShadowStore,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What happened to a confirmation once its debounce window elapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// A newer raw event arrived in the meantime; the message was dropped
    Superseded,
    /// The asserted status was committed
    Committed { notified: bool },
}

/// Commits asserted statuses that survived the debounce window
pub struct ConfirmationService {
    shadows: Arc<dyn ShadowStore>,
    registry: Arc<dyn DeviceRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmationService {
    pub fn new(
        shadows: Arc<dyn ShadowStore>,
        registry: Arc<dyn DeviceRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shadows,
            registry,
            notifier,
        }
    }

    #[instrument(
        skip(self, message),
        fields(
            device_id = %message.device_id,
            transient_id = %message.transient_id,
            asserted_status = %message.asserted_status
        )
    )]
    pub async fn handle_confirmation(
        &self,
        message: ConfirmationMessage,
    ) -> DomainResult<ConfirmationOutcome> {
        // check and commit in one step so an event landing in between wins
        let committed = self
            .shadows
            .commit_status_if_current(
                &message.device_id,
                &message.transient_id,
                message.asserted_status,
                message.event_time,
            )
            .await?;
        if !committed {
            debug!("confirmation superseded by a newer event");
            return Ok(ConfirmationOutcome::Superseded);
        }

        // redelivery of an applied message finds the flag already set
        let visible = message.asserted_status.is_visible();
        let device = self.registry.get(&message.device_id).await?;
        if device.visible == visible {
            debug!(visible, "visibility already matches, not notifying");
            return Ok(ConfirmationOutcome::Committed { notified: false });
        }

        let notified = commit_visibility(
            self.registry.as_ref(),
            self.notifier.as_ref(),
            &device,
            visible,
            message.event_time,
        )
        .await?;
        if notified {
            info!("status confirmed after debounce window");
        }

        Ok(ConfirmationOutcome::Committed { notified })
    }
}
