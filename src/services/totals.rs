use rust_decimal::Decimal;

use crate::config::AppConfig;
use crate::models::{CartItem, TotalsSnapshot};

/// Pure totals calculator for a cart snapshot.
///
/// Local recomputation is canonical only until a gateway-issued
/// `orderSummary` exists for the attempt; from then on the backend
/// snapshot is authoritative (see the checkout orchestrator).
#[derive(Debug, Clone)]
pub struct TotalsCalculator {
    free_shipping_threshold: Decimal,
    flat_shipping_fee: Decimal,
}

impl Default for TotalsCalculator {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::from(500),
            flat_shipping_fee: Decimal::from(50),
        }
    }
}

impl TotalsCalculator {
    pub fn new(free_shipping_threshold: Decimal, flat_shipping_fee: Decimal) -> Self {
        Self {
            free_shipping_threshold,
            flat_shipping_fee,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.free_shipping_threshold, config.flat_shipping_fee)
    }

    /// Items subtotal: Σ price × quantity.
    pub fn items_price(&self, items: &[CartItem]) -> Decimal {
        items.iter().map(CartItem::line_total).sum()
    }

    /// Free above the threshold, flat fee otherwise.
    pub fn shipping_fee(&self, items_price: Decimal) -> Decimal {
        if items_price > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_shipping_fee
        }
    }

    /// Totals for the cash-on-delivery path, where no backend summary
    /// exists and tax is zero.
    pub fn cod_totals(&self, items: &[CartItem]) -> TotalsSnapshot {
        let items_price = self.items_price(items);
        let shipping_price = self.shipping_fee(items_price);
        TotalsSnapshot::new(items_price, shipping_price, Decimal::ZERO)
    }
}
