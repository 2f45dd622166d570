pub mod cart;
pub mod checkout;
pub mod gateway;
pub mod orders;
pub mod shipping;
pub mod totals;

// Re-export services for convenience
pub use cart::{CartBackend, CartStore, HttpCartBackend};
pub use checkout::{CheckoutOrchestrator, CheckoutState, PartialCharge};
pub use gateway::{ChargeOutcome, HttpPaymentGateway, IntentItem, PaymentGateway, PaymentIntent};
pub use orders::{HttpOrderService, OrderService};
pub use shipping::ShippingProfileStore;
pub use totals::TotalsCalculator;
