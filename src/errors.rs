use thiserror::Error;

/// Crate-wide error taxonomy for the checkout pipeline.
///
/// The variants follow the propagation policy of the checkout flow:
/// validation errors are resolved locally and never reach the network
/// layer; gateway and backend failures are reported with the prior state
/// intact so the caller may retry; `OrderCreationFailed` is the one
/// variant that represents money captured without a corresponding order
/// and must never be collapsed into a generic failure.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment declined: {0}")]
    GatewayDeclined(String),

    #[error("Cart service error: {0}")]
    CartBackend(String),

    #[error("Order service error: {0}")]
    OrderBackend(String),

    #[error("Order creation failed after charge {charge_id} was captured: {message}")]
    OrderCreationFailed { charge_id: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CheckoutError {
    /// Whether the failure left no external side effect and may simply be
    /// retried from the start of the flow.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CheckoutError::GatewayUnavailable(_)
                | CheckoutError::CartBackend(_)
                | CheckoutError::OrderBackend(_)
        )
    }

    /// Whether a charge was captured without a matching order record.
    /// Such failures need an idempotent order-creation retry, not a
    /// fresh payment attempt.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, CheckoutError::OrderCreationFailed { .. })
    }

    /// The gateway charge id carried by a partial failure, if any.
    pub fn charge_id(&self) -> Option<&str> {
        match self {
            CheckoutError::OrderCreationFailed { charge_id, .. } => Some(charge_id),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}
