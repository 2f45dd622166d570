use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the checkout pipeline.
///
/// Every externally observable transition publishes an event, so failures
/// that demand follow-up (a captured charge without an order record) are
/// always recorded somewhere retrievable, independent of whatever surface
/// triggered the checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        item_id: Uuid,
    },
    CartCleared,

    // Shipping events
    ShippingProfileSaved,

    // Checkout events
    IntentRequested,
    IntentReady {
        total: Decimal,
    },
    PaymentCaptured {
        charge_id: String,
    },
    PaymentFailed {
        reason: String,
    },
    OrderCreated {
        order_id: String,
    },
    OrderCreationFailed {
        charge_id: String,
    },
}

/// Cloneable handle for publishing [`Event`]s onto the bus.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Create a sender together with the receiving half of the bus.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event, failing if the receiving side has gone away.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed bus is logged rather than propagated, since
    /// event delivery must never fail a checkout operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!("Event bus unavailable, dropping {:?}: {}", event, e);
        }
    }
}

/// Drains the event bus, logging each event at a severity matching its
/// operational weight. Spawn this once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match event {
            Event::OrderCreationFailed { ref charge_id } => {
                error!(
                    %charge_id,
                    "charge captured without a corresponding order; reconciliation required"
                );
            }
            Event::PaymentFailed { ref reason } => {
                warn!("payment failed: {}", reason);
            }
            Event::OrderCreated { ref order_id } => {
                info!(%order_id, "order created");
            }
            Event::PaymentCaptured { ref charge_id } => {
                info!(%charge_id, "payment captured");
            }
            other => {
                info!("event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}
