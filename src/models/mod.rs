pub mod cart;
pub mod order;
pub mod shipping;
pub mod totals;

// Re-export the domain types for convenience
pub use cart::{CartFingerprint, CartItem, Product, ProductImage};
pub use order::{CreatedOrder, OrderDraft, OrderLine, PaymentInfo};
pub use shipping::{ShippingInfo, ValidationReport};
pub use totals::TotalsSnapshot;
