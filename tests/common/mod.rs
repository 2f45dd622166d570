//! Shared test harness: in-process doubles for the backing cart
//! service, the payment gateway and the order service, plus a fully
//! wired orchestrator.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use storefront_checkout::errors::CheckoutError;
use storefront_checkout::events::{Event, EventSender};
use storefront_checkout::models::{
    CartItem, CreatedOrder, OrderDraft, Product, ProductImage, ShippingInfo, TotalsSnapshot,
};
use storefront_checkout::services::{
    CartBackend, CartStore, ChargeOutcome, CheckoutOrchestrator, IntentItem, OrderService,
    PaymentGateway, PaymentIntent, ShippingProfileStore, TotalsCalculator,
};

/// In-memory stand-in for the backing cart service. Mirrors the real
/// contract: merges adds by product, returns the updated cart from every
/// mutation, and can be told to fail the next call.
pub struct InMemoryCartBackend {
    catalog: AsyncMutex<HashMap<Uuid, Product>>,
    items: AsyncMutex<Vec<CartItem>>,
    fail_next: AtomicBool,
}

impl InMemoryCartBackend {
    pub fn new() -> Self {
        Self {
            catalog: AsyncMutex::new(HashMap::new()),
            items: AsyncMutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    pub async fn register_product(&self, product: Product) {
        self.catalog.lock().await.insert(product.id, product);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Result<(), CheckoutError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(CheckoutError::CartBackend(
                "scripted cart service failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CartBackend for InMemoryCartBackend {
    async fn fetch(&self) -> Result<Vec<CartItem>, CheckoutError> {
        self.take_failure()?;
        Ok(self.items.lock().await.clone())
    }

    async fn add_item(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError> {
        self.take_failure()?;
        let product = self
            .catalog
            .lock()
            .await
            .get(&product_id)
            .cloned()
            .ok_or_else(|| {
                CheckoutError::NotFound(format!("product {} not found", product_id))
            })?;

        let mut items = self.items.lock().await;
        if let Some(line) = items.iter_mut().find(|line| line.product.id == product_id) {
            line.quantity += quantity;
        } else {
            items.push(CartItem {
                id: Uuid::new_v4(),
                product,
                quantity,
            });
        }
        Ok(items.clone())
    }

    async fn update_item(
        &self,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartItem>, CheckoutError> {
        self.take_failure()?;
        let mut items = self.items.lock().await;
        if quantity <= 0 {
            items.retain(|line| line.id != item_id);
        } else if let Some(line) = items.iter_mut().find(|line| line.id == item_id) {
            line.quantity = quantity;
        }
        Ok(items.clone())
    }

    async fn remove_item(&self, item_id: Uuid) -> Result<Vec<CartItem>, CheckoutError> {
        self.take_failure()?;
        let mut items = self.items.lock().await;
        items.retain(|line| line.id != item_id);
        Ok(items.clone())
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        self.take_failure()?;
        self.items.lock().await.clear();
        Ok(())
    }
}

/// Scripted payment gateway double.
///
/// Issues numbered client secrets (`cs_test_1`, `cs_test_2`, …) and
/// charge ids (`ch_1`, `ch_2`, …), prices intents from the submitted
/// items plus a fixed tax amount, and can be told to decline or drop the
/// next call.
pub struct ScriptedGateway {
    tax: Decimal,
    intents_issued: AtomicUsize,
    confirm_calls: AtomicUsize,
    intent_unavailable_next: AtomicBool,
    confirm_unavailable_next: AtomicBool,
    decline_next: AsyncMutex<Option<String>>,
    confirm_status_next: AsyncMutex<Option<String>>,
    confirmed_secrets: AsyncMutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(tax: Decimal) -> Self {
        Self {
            tax,
            intents_issued: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
            intent_unavailable_next: AtomicBool::new(false),
            confirm_unavailable_next: AtomicBool::new(false),
            decline_next: AsyncMutex::new(None),
            confirm_status_next: AsyncMutex::new(None),
            confirmed_secrets: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn intents_issued(&self) -> usize {
        self.intents_issued.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_intent(&self) {
        self.intent_unavailable_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_confirm(&self) {
        self.confirm_unavailable_next.store(true, Ordering::SeqCst);
    }

    pub async fn decline_next(&self, message: &str) {
        *self.decline_next.lock().await = Some(message.to_string());
    }

    pub async fn next_confirm_status(&self, status: &str) {
        *self.confirm_status_next.lock().await = Some(status.to_string());
    }

    pub async fn confirmed_secrets(&self) -> Vec<String> {
        self.confirmed_secrets.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
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
        if self.intent_unavailable_next.swap(false, Ordering::SeqCst) {
            return Err(CheckoutError::GatewayUnavailable(
                "scripted gateway outage".to_string(),
            ));
        }

        let n = self.intents_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let items_price: Decimal = items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();

        Ok(PaymentIntent {
            client_secret: format!("cs_test_{}", n),
            order_summary: TotalsSnapshot::new(items_price, shipping_fee, self.tax),
        })
    }

    async fn confirm_charge(
        &self,
        client_secret: &str,
        _payment_method: &str,
    ) -> Result<ChargeOutcome, CheckoutError> {
        let n = self.confirm_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.confirmed_secrets
            .lock()
            .await
            .push(client_secret.to_string());

        if let Some(message) = self.decline_next.lock().await.take() {
            return Err(CheckoutError::GatewayDeclined(message));
        }
        if self.confirm_unavailable_next.swap(false, Ordering::SeqCst) {
            return Err(CheckoutError::GatewayUnavailable(
                "scripted gateway outage".to_string(),
            ));
        }

        let status = self
            .confirm_status_next
            .lock()
            .await
            .take()
            .unwrap_or_else(|| "succeeded".to_string());

        Ok(ChargeOutcome {
            id: format!("ch_{}", n),
            status,
        })
    }
}

/// Order service double enforcing idempotency-key semantics: repeating a
/// create with the same key returns the original order and never records
/// a second one.
pub struct RecordingOrderService {
    fail_remaining: AtomicUsize,
    create_calls: AtomicUsize,
    orders: AsyncMutex<HashMap<String, CreatedOrder>>,
    drafts: AsyncMutex<Vec<OrderDraft>>,
}

impl RecordingOrderService {
    pub fn new() -> Self {
        Self {
            fail_remaining: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            orders: AsyncMutex::new(HashMap::new()),
            drafts: AsyncMutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` create calls with a backend error.
    pub fn fail_times(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn order_count(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn drafts(&self) -> Vec<OrderDraft> {
        self.drafts.lock().await.clone()
    }
}

#[async_trait]
impl OrderService for RecordingOrderService {
    async fn create(
        &self,
        draft: &OrderDraft,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CheckoutError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(CheckoutError::OrderBackend(
                "order service unavailable".to_string(),
            ));
        }

        let mut orders = self.orders.lock().await;
        if let Some(existing) = orders.get(idempotency_key) {
            return Ok(existing.clone());
        }

        let order = CreatedOrder {
            id: format!("order_{}", orders.len() + 1),
        };
        orders.insert(idempotency_key.to_string(), order.clone());
        self.drafts.lock().await.push(draft.clone());
        Ok(order)
    }
}

/// Fully wired checkout harness over the in-process doubles.
pub struct TestCheckout {
    pub backend: Arc<InMemoryCartBackend>,
    pub cart: Arc<CartStore>,
    pub shipping: Arc<ShippingProfileStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub orders: Arc<RecordingOrderService>,
    pub checkout: CheckoutOrchestrator,
    events: Arc<AsyncMutex<Vec<Event>>>,
}

impl TestCheckout {
    pub async fn new() -> Self {
        Self::with_tax(Decimal::ZERO).await
    }

    pub async fn with_tax(tax: Decimal) -> Self {
        let (event_sender, mut receiver) = EventSender::channel(256);
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = events.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                sink.lock().await.push(event);
            }
        });

        let backend = Arc::new(InMemoryCartBackend::new());
        let cart_backend: Arc<dyn CartBackend> = backend.clone();
        let cart = Arc::new(CartStore::new(cart_backend, event_sender.clone()));
        let shipping = Arc::new(ShippingProfileStore::new(event_sender.clone()));
        let gateway = Arc::new(ScriptedGateway::new(tax));
        let orders = Arc::new(RecordingOrderService::new());

        let checkout = CheckoutOrchestrator::new(
            cart.clone(),
            shipping.clone(),
            TotalsCalculator::default(),
            gateway.clone(),
            orders.clone(),
            event_sender,
        );

        Self {
            backend,
            cart,
            shipping,
            gateway,
            orders,
            checkout,
            events,
        }
    }

    /// Adds one line per `(price, quantity)` pair and returns the cart.
    pub async fn seed_cart(&self, lines: &[(Decimal, i32)]) -> Vec<CartItem> {
        for (price, quantity) in lines {
            let widget = product(*price);
            self.backend.register_product(widget.clone()).await;
            self.cart.add(&widget, *quantity).await.expect("seed add");
        }
        self.cart.items().await
    }

    pub async fn save_valid_shipping(&self) {
        self.shipping
            .save(valid_shipping())
            .await
            .expect("valid shipping profile");
    }

    /// Recorded events, after letting the collector task drain the bus.
    pub async fn events(&self) -> Vec<Event> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.events.lock().await.clone()
    }
}

pub fn product(price: Decimal) -> Product {
    let id = Uuid::new_v4();
    Product {
        id,
        name: format!("Widget {}", &id.to_string()[..8]),
        price,
        images: vec![ProductImage {
            url: format!("https://cdn.example/{}.png", id),
        }],
    }
}

pub fn valid_shipping() -> ShippingInfo {
    ShippingInfo {
        address: "221B Baker Street".to_string(),
        city: "Mumbai".to_string(),
        state: "Maharashtra".to_string(),
        country: "India".to_string(),
        pin_code: "400001".to_string(),
        phone_no: "1234567890".to_string(),
    }
}
