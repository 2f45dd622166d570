use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::CartItem;
use super::shipping::ShippingInfo;
use super::totals::TotalsSnapshot;

/// How an order was (or will be) paid.
///
/// Either synthesized for cash-on-delivery or copied from the gateway's
/// confirmed charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub id: String,
    pub status: String,
}

impl PaymentInfo {
    const COD_STATUS: &'static str = "Cash on Delivery";
    const CAPTURED_STATUS: &'static str = "succeeded";

    /// Payment record for the cash-on-delivery path. The id doubles as
    /// the idempotency key for order creation.
    pub fn cash_on_delivery(at: DateTime<Utc>) -> Self {
        Self {
            id: format!("COD_{}", at.timestamp_millis()),
            status: Self::COD_STATUS.to_string(),
        }
    }

    /// Payment record for a captured card charge.
    pub fn captured(charge_id: impl Into<String>) -> Self {
        Self {
            id: charge_id.into(),
            status: Self::CAPTURED_STATUS.to_string(),
        }
    }

    pub fn is_cash_on_delivery(&self) -> bool {
        self.status == Self::COD_STATUS
    }
}

/// One line of an order draft, denormalized from the cart at submit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub name: String,
    pub quantity: i32,
    pub image: Option<String>,
    pub price: Decimal,
    pub product: Uuid,
}

/// The payload submitted to the order service. Once accepted it becomes
/// an immutable order owned by that service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub shipping_info: ShippingInfo,
    pub order_items: Vec<OrderLine>,
    pub payment_info: PaymentInfo,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

impl OrderDraft {
    /// Assembles a draft from a cart snapshot, a shipping profile, the
    /// payment record and the canonical totals for this attempt.
    pub fn assemble(
        shipping_info: ShippingInfo,
        items: &[CartItem],
        payment_info: PaymentInfo,
        totals: &TotalsSnapshot,
    ) -> Self {
        let order_items = items
            .iter()
            .map(|item| OrderLine {
                name: item.product.name.clone(),
                quantity: item.quantity,
                image: item.product.primary_image().map(str::to_string),
                price: item.product.price,
                product: item.product.id,
            })
            .collect();

        Self {
            shipping_info,
            order_items,
            payment_info,
            items_price: totals.items_price,
            tax_price: totals.tax_price,
            shipping_price: totals.shipping_price,
            total_price: totals.total_price,
        }
    }
}

/// The durable order identifier returned by the order service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedOrder {
    #[serde(rename = "_id")]
    pub id: String,
}
