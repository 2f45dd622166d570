use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::config::AppConfig;
use crate::errors::CheckoutError;
use crate::models::{CreatedOrder, OrderDraft};

/// External collaborator that persists order drafts.
///
/// `idempotency_key` is the payment id of the draft (gateway charge id or
/// synthesized COD id); the collaborator guarantees that repeating a
/// create with the same key produces at most one order. That contract is
/// what makes retrying order creation after a partial failure safe.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create(
        &self,
        draft: &OrderDraft,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CheckoutError>;
}

/// HTTP implementation of [`OrderService`] against the order backend.
#[derive(Clone)]
pub struct HttpOrderService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .unwrap(),
            base_url: config.order_service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: CreatedOrder,
}

#[async_trait]
impl OrderService for HttpOrderService {
    #[instrument(skip(self, draft))]
    async fn create(
        &self,
        draft: &OrderDraft,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CheckoutError> {
        let response = self
            .client
            .post(format!("{}/order/new", self.base_url))
            .header("Idempotency-Key", idempotency_key)
            .json(draft)
            .send()
            .await
            .map_err(|e| CheckoutError::OrderBackend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::OrderBackend(format!(
                "order service returned {}: {}",
                status, body
            )));
        }

        let envelope: OrderEnvelope = response
            .json()
            .await
            .map_err(|e| CheckoutError::OrderBackend(e.to_string()))?;
        Ok(envelope.order)
    }
}
