use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical order totals for one cart snapshot.
///
/// On the card path this arrives from the payment backend as
/// `orderSummary` (which spells the shipping component `shippingFee`);
/// the alias keeps the struct readable from either spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSnapshot {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    #[serde(rename = "shippingFee", alias = "shippingPrice")]
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

impl TotalsSnapshot {
    /// Builds a snapshot upholding the totals invariant:
    /// `total_price = items_price + shipping_price + tax_price`.
    pub fn new(items_price: Decimal, shipping_price: Decimal, tax_price: Decimal) -> Self {
        Self {
            items_price,
            tax_price,
            shipping_price,
            total_price: items_price + shipping_price + tax_price,
        }
    }
}
