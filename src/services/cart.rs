use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::CheckoutError;
use crate::events::{Event, EventSender};
use crate::models::{CartFingerprint, CartItem, Product};

/// Backing cart service consumed by [`CartStore`].
///
/// Every mutation returns the updated cart as the server sees it; that
/// response is the reconciliation point for the optimistic local view.
#[async_trait]
pub trait CartBackend: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CartItem>, CheckoutError>;
    async fn add_item(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError>;
    async fn update_item(
        &self,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError>;
    async fn remove_item(&self, item_id: Uuid) -> Result<Vec<CartItem>, CheckoutError>;
    async fn clear(&self) -> Result<(), CheckoutError>;
}

/// Local cart state reconciled against the backing cart service.
///
/// Each mutation is a command: take the per-entity lock, snapshot the
/// prior state, apply the update optimistically, then send it to the
/// backend. On success the server's view replaces the optimistic one;
/// on failure the prior snapshot is restored and the error surfaced.
/// The per-entity lock serializes overlapping mutations on the same
/// line in issue order, so quantity changes are never applied against a
/// stale read and two compensations can never race on one entity.
#[derive(Clone)]
pub struct CartStore {
    backend: Arc<dyn CartBackend>,
    event_sender: EventSender,
    items: Arc<RwLock<Vec<CartItem>>>,
    entity_locks: Arc<AsyncMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl CartStore {
    pub fn new(backend: Arc<dyn CartBackend>, event_sender: EventSender) -> Self {
        Self {
            backend,
            event_sender,
            items: Arc::new(RwLock::new(Vec::new())),
            entity_locks: Arc::new(AsyncMutex::new(HashMap::new())),
        }
    }

    /// Reloads the local view from the backing service.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<CartItem>, CheckoutError> {
        let items = self.backend.fetch().await?;
        *self.items.write().await = items.clone();
        Ok(items)
    }

    /// Adds a product to the cart, merging with an existing line for the
    /// same product.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: &Product, quantity: i32) -> Result<(), CheckoutError> {
        if quantity <= 0 {
            return Err(CheckoutError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let lock = self.acquire_entity_lock(product.id).await;
        let guard = lock.lock().await;
        let outcome = self.add_locked(product, quantity).await;
        drop(guard);
        self.release_entity_lock(product.id, lock).await;
        outcome
    }

    /// Sets the quantity of a cart line. Zero or below behaves exactly
    /// like [`CartStore::remove`].
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), CheckoutError> {
        if quantity <= 0 {
            return self.remove(item_id).await;
        }

        let lock = self.acquire_entity_lock(item_id).await;
        let guard = lock.lock().await;
        let outcome = self.update_quantity_locked(item_id, quantity).await;
        drop(guard);
        self.release_entity_lock(item_id, lock).await;
        outcome
    }

    /// Removes a cart line.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: Uuid) -> Result<(), CheckoutError> {
        let lock = self.acquire_entity_lock(item_id).await;
        let guard = lock.lock().await;
        let outcome = self.remove_locked(item_id).await;
        drop(guard);
        self.release_entity_lock(item_id, lock).await;
        outcome
    }

    /// Empties the cart (used once an order has been accepted).
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CheckoutError> {
        let prior = self.items.read().await.clone();
        self.items.write().await.clear();

        match self.backend.clear().await {
            Ok(()) => {
                self.event_sender.send_or_log(Event::CartCleared).await;
                info!("cart cleared");
                Ok(())
            }
            Err(err) => {
                warn!("cart clear failed, restoring local view: {}", err);
                *self.items.write().await = prior;
                Err(err)
            }
        }
    }

    /// Current snapshot of the cart contents.
    pub async fn items(&self) -> Vec<CartItem> {
        self.items.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Fingerprint of the current contents, used to bind payment intents
    /// to the snapshot they were priced against.
    pub async fn fingerprint(&self) -> CartFingerprint {
        CartFingerprint::of(&self.items.read().await)
    }

    async fn add_locked(&self, product: &Product, quantity: i32) -> Result<(), CheckoutError> {
        let prior = self.items.read().await.clone();

        {
            let mut items = self.items.write().await;
            if let Some(line) = items.iter_mut().find(|line| line.product.id == product.id) {
                line.quantity += quantity;
            } else {
                items.push(CartItem {
                    // Placeholder id; the server response below carries
                    // the durable one.
                    id: Uuid::new_v4(),
                    product: product.clone(),
                    quantity,
                });
            }
        }

        match self.backend.add_item(product.id, quantity).await {
            Ok(server_items) => {
                *self.items.write().await = server_items;
                self.event_sender
                    .send_or_log(Event::CartItemAdded {
                        product_id: product.id,
                        quantity,
                    })
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!("cart add failed, rolling back optimistic update: {}", err);
                *self.items.write().await = prior;
                Err(err)
            }
        }
    }

    async fn update_quantity_locked(
        &self,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), CheckoutError> {
        let prior = self.items.read().await.clone();

        {
            let mut items = self.items.write().await;
            let line = items
                .iter_mut()
                .find(|line| line.id == item_id)
                .ok_or_else(|| {
                    CheckoutError::NotFound(format!("cart item {} not found", item_id))
                })?;
            line.quantity = quantity;
        }

        match self.backend.update_item(item_id, quantity).await {
            Ok(server_items) => {
                *self.items.write().await = server_items;
                self.event_sender
                    .send_or_log(Event::CartItemUpdated { item_id, quantity })
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!(
                    "cart quantity update failed, rolling back optimistic update: {}",
                    err
                );
                *self.items.write().await = prior;
                Err(err)
            }
        }
    }

    async fn remove_locked(&self, item_id: Uuid) -> Result<(), CheckoutError> {
        let prior = self.items.read().await.clone();

        if !prior.iter().any(|line| line.id == item_id) {
            return Err(CheckoutError::NotFound(format!(
                "cart item {} not found",
                item_id
            )));
        }

        self.items
            .write()
            .await
            .retain(|line| line.id != item_id);

        match self.backend.remove_item(item_id).await {
            Ok(server_items) => {
                *self.items.write().await = server_items;
                self.event_sender
                    .send_or_log(Event::CartItemRemoved { item_id })
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!("cart remove failed, rolling back optimistic update: {}", err);
                *self.items.write().await = prior;
                Err(err)
            }
        }
    }

    async fn acquire_entity_lock(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.entity_locks.lock().await;
        if let Some(lock) = locks.get(&id) {
            lock.clone()
        } else {
            let new_lock = Arc::new(AsyncMutex::new(()));
            locks.insert(id, new_lock.clone());
            new_lock
        }
    }

    async fn release_entity_lock(&self, id: Uuid, lock: Arc<AsyncMutex<()>>) {
        if Arc::strong_count(&lock) == 1 {
            let mut locks = self.entity_locks.lock().await;
            if let Some(existing) = locks.get(&id) {
                if Arc::ptr_eq(existing, &lock) {
                    locks.remove(&id);
                }
            }
        }
    }
}

/// HTTP implementation of [`CartBackend`] against the storefront cart
/// service.
#[derive(Clone)]
pub struct HttpCartBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .unwrap(),
            base_url: config.cart_service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CartEnvelope {
    #[serde(default)]
    items: Vec<CartItem>,
}

async fn parse_items(response: reqwest::Response) -> Result<Vec<CartItem>, CheckoutError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CheckoutError::CartBackend(format!(
            "cart service returned {}: {}",
            status, body
        )));
    }

    let envelope: CartEnvelope = response
        .json()
        .await
        .map_err(|e| CheckoutError::CartBackend(e.to_string()))?;
    Ok(envelope.items)
}

fn transport_error(err: reqwest::Error) -> CheckoutError {
    CheckoutError::CartBackend(err.to_string())
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    async fn fetch(&self) -> Result<Vec<CartItem>, CheckoutError> {
        let response = self
            .client
            .get(format!("{}/cart", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        parse_items(response).await
    }

    async fn add_item(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError> {
        let response = self
            .client
            .post(format!("{}/cart/items", self.base_url))
            .json(&json!({ "productId": product_id, "quantity": quantity }))
            .send()
            .await
            .map_err(transport_error)?;
        parse_items(response).await
    }

    async fn update_item(
        &self,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError> {
        let response = self
            .client
            .put(format!("{}/cart/items/{}", self.base_url, item_id))
            .json(&json!({ "quantity": quantity }))
            .send()
            .await
            .map_err(transport_error)?;
        parse_items(response).await
    }

    async fn remove_item(&self, item_id: Uuid) -> Result<Vec<CartItem>, CheckoutError> {
        let response = self
            .client
            .delete(format!("{}/cart/items/{}", self.base_url, item_id))
            .send()
            .await
            .map_err(transport_error)?;
        parse_items(response).await
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        let response = self
            .client
            .delete(format!("{}/cart", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::CartBackend(format!(
                "cart service returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
