use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::errors::CheckoutError;
use crate::events::{Event, EventSender};
use crate::models::ShippingInfo;

/// Session-scoped holder for the delivery address.
///
/// An explicit, injectable container rather than process-global state:
/// created at session start, overwritten on save, emptied by `reset`
/// (logout or order completion). The stored profile has no TTL.
#[derive(Clone)]
pub struct ShippingProfileStore {
    profile: Arc<RwLock<Option<ShippingInfo>>>,
    event_sender: EventSender,
}

impl ShippingProfileStore {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            profile: Arc::new(RwLock::new(None)),
            event_sender,
        }
    }

    /// Validates and stores the profile. Invalid input is rejected with
    /// the per-field reasons and the previously saved profile survives.
    #[instrument(skip(self, info))]
    pub async fn save(&self, info: ShippingInfo) -> Result<(), CheckoutError> {
        let report = info.validate();
        if !report.valid {
            return Err(CheckoutError::Validation(report.reasons.join("; ")));
        }

        *self.profile.write().await = Some(info);
        self.event_sender
            .send_or_log(Event::ShippingProfileSaved)
            .await;
        debug!("shipping profile saved");
        Ok(())
    }

    pub async fn get(&self) -> Option<ShippingInfo> {
        self.profile.read().await.clone()
    }

    /// Whether a valid profile is present; gates both checkout paths.
    pub async fn is_complete(&self) -> bool {
        self.profile
            .read()
            .await
            .as_ref()
            .map(ShippingInfo::is_valid)
            .unwrap_or(false)
    }

    pub async fn reset(&self) {
        *self.profile.write().await = None;
    }
}
