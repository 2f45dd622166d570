use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::config::AppConfig;
use crate::errors::CheckoutError;
use crate::models::{CartItem, TotalsSnapshot};

/// A cart line as priced by the payment backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentItem {
    pub price: Decimal,
    pub quantity: i32,
}

impl From<&CartItem> for IntentItem {
    fn from(item: &CartItem) -> Self {
        Self {
            price: item.product.price,
            quantity: item.quantity,
        }
    }
}

/// A gateway-issued authorization bound to one cart snapshot's totals,
/// redeemable once via [`PaymentGateway::confirm_charge`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub client_secret: String,
    #[serde(rename = "orderSummary")]
    pub order_summary: TotalsSnapshot,
}

/// Result of a confirm call that reached the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChargeOutcome {
    pub id: String,
    pub status: String,
}

impl ChargeOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Abstraction over the external payment gateway.
///
/// Failure taxonomy: transport problems surface as
/// [`CheckoutError::GatewayUnavailable`] (transient, retry with a fresh
/// intent); gateway-reported card failures surface as
/// [`CheckoutError::GatewayDeclined`] (user-correctable, no charge
/// captured). A declined attempt abandons its client secret.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn request_intent(
        &self,
        items: &[IntentItem],
        shipping_fee: Decimal,
    ) -> Result<PaymentIntent, CheckoutError>;

    async fn confirm_charge(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ChargeOutcome, CheckoutError>;
}

/// HTTP implementation of [`PaymentGateway`] against the payment backend.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .unwrap(),
            base_url: config.payment_service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    #[serde(rename = "paymentIntent")]
    payment_intent: Option<ChargeOutcome>,
    error: Option<GatewayErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: String,
}

fn transport_error(err: reqwest::Error) -> CheckoutError {
    CheckoutError::GatewayUnavailable(err.to_string())
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, items))]
    async fn request_intent(
        &self,
        items: &[IntentItem],
        shipping_fee: Decimal,
    ) -> Result<PaymentIntent, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::Validation(
                "cannot request a payment intent for an empty cart".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/payment/process", self.base_url))
            .json(&json!({ "items": items, "shippingFee": shipping_fee }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CheckoutError::GatewayUnavailable(format!(
                "payment backend returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Validation(format!(
                "payment backend rejected intent request ({}): {}",
                status, body
            )));
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))
    }

    #[instrument(skip(self, client_secret, payment_method))]
    async fn confirm_charge(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ChargeOutcome, CheckoutError> {
        let response = self
            .client
            .post(format!("{}/payment/confirm", self.base_url))
            .json(&json!({
                "clientSecret": client_secret,
                "paymentMethod": payment_method,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CheckoutError::GatewayUnavailable(format!(
                "payment gateway returned {}",
                status
            )));
        }

        // The gateway reports card failures inside the body, for 2xx and
        // 4xx alike.
        let body: ConfirmResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        if let Some(error) = body.error {
            warn!("charge declined: {}", error.message);
            return Err(CheckoutError::GatewayDeclined(error.message));
        }

        body.payment_intent.ok_or_else(|| {
            CheckoutError::GatewayUnavailable(
                "payment gateway returned neither a payment intent nor an error".to_string(),
            )
        })
    }
}
