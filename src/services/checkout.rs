use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, instrument, warn};

use crate::errors::CheckoutError;
use crate::events::{Event, EventSender};
use crate::models::{
    CartFingerprint, CartItem, CreatedOrder, OrderDraft, PaymentInfo, ShippingInfo, TotalsSnapshot,
};
use crate::services::cart::CartStore;
use crate::services::gateway::{IntentItem, PaymentGateway, PaymentIntent};
use crate::services::orders::OrderService;
use crate::services::shipping::ShippingProfileStore;
use crate::services::totals::TotalsCalculator;

/// States of one checkout attempt.
///
/// `PaymentFailed` is terminal-without-charge: nothing external happened
/// and the flow restarts from `Idle`. `OrderCreationFailed` is only
/// reachable after a captured charge and is deliberately NOT equivalent
/// to `PaymentFailed`: it carries the charge id and the only way forward
/// is an idempotent retry of order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    IntentRequested,
    IntentReady,
    Confirming,
    PaymentSucceeded { charge_id: String },
    PaymentFailed { reason: String },
    OrderCreated { order_id: String },
    OrderCreationFailed { charge_id: String },
}

/// Retrievable record of a captured charge whose order record is missing.
#[derive(Debug, Clone)]
pub struct PartialCharge {
    pub charge_id: String,
    pub draft: OrderDraft,
    pub failed_at: DateTime<Utc>,
    pub last_error: String,
}

#[derive(Debug, Clone)]
struct BoundIntent {
    intent: PaymentIntent,
    fingerprint: CartFingerprint,
}

#[derive(Debug)]
struct CheckoutInner {
    state: CheckoutState,
    intent: Option<BoundIntent>,
    pending: Option<PartialCharge>,
}

/// Drives a cart plus shipping profile to a confirmed order, via
/// cash-on-delivery or a two-phase card payment against the gateway.
///
/// All transitions happen under one async mutex: each operation locks,
/// checks the current state, performs its awaits and writes the
/// successor state before releasing, so overlapping calls always observe
/// a consistent machine and no state is reachable outside a defined
/// transition.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    cart: Arc<CartStore>,
    shipping: Arc<ShippingProfileStore>,
    totals: TotalsCalculator,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderService>,
    event_sender: EventSender,
    inner: Arc<AsyncMutex<CheckoutInner>>,
}

impl CheckoutOrchestrator {
    pub fn new(
        cart: Arc<CartStore>,
        shipping: Arc<ShippingProfileStore>,
        totals: TotalsCalculator,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            cart,
            shipping,
            totals,
            gateway,
            orders,
            event_sender,
            inner: Arc::new(AsyncMutex::new(CheckoutInner {
                state: CheckoutState::Idle,
                intent: None,
                pending: None,
            })),
        }
    }

    pub async fn state(&self) -> CheckoutState {
        self.inner.lock().await.state.clone()
    }

    /// The partial charge awaiting reconciliation, if the last attempt
    /// captured a payment without creating an order.
    pub async fn pending_reconciliation(&self) -> Option<PartialCharge> {
        self.inner.lock().await.pending.clone()
    }

    /// Cash-on-delivery: totals are computed locally (tax is zero), the
    /// payment record is synthesized, and the gateway is bypassed
    /// entirely.
    #[instrument(skip(self))]
    pub async fn place_cod_order(&self) -> Result<CreatedOrder, CheckoutError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CheckoutState::Idle | CheckoutState::PaymentFailed { .. } => {}
            ref state => {
                return Err(CheckoutError::InvalidOperation(format!(
                    "cannot place a cash-on-delivery order from state {:?}",
                    state
                )))
            }
        }

        let (items, shipping) = self.checkout_inputs().await?;
        let totals = self.totals.cod_totals(&items);
        let payment = PaymentInfo::cash_on_delivery(Utc::now());
        let draft = OrderDraft::assemble(shipping, &items, payment.clone(), &totals);

        match self.orders.create(&draft, &payment.id).await {
            Ok(order) => {
                inner.state = CheckoutState::OrderCreated {
                    order_id: order.id.clone(),
                };
                inner.intent = None;
                self.finish_order(&order).await;
                Ok(order)
            }
            Err(err) => {
                // No charge was captured; the attempt restarts cleanly.
                inner.state = CheckoutState::Idle;
                warn!("cash-on-delivery order creation failed: {}", err);
                Err(err)
            }
        }
    }

    /// Requests a payment intent for the current cart snapshot and
    /// returns the backend-issued order summary.
    #[instrument(skip(self))]
    pub async fn request_intent(&self) -> Result<TotalsSnapshot, CheckoutError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CheckoutState::Idle
            | CheckoutState::IntentReady
            | CheckoutState::PaymentFailed { .. } => {}
            ref state => {
                return Err(CheckoutError::InvalidOperation(format!(
                    "cannot request a payment intent from state {:?}",
                    state
                )))
            }
        }

        let (items, _) = self.checkout_inputs().await?;
        self.request_intent_locked(&mut inner, &items).await
    }

    /// Confirms the charge for the prepared intent and submits the order
    /// draft built from the backend-issued summary.
    ///
    /// If the cart mutated since the intent was issued, the stale intent
    /// is discarded and a fresh one requested first; a confirmation never
    /// races a cart change.
    #[instrument(skip(self, payment_method))]
    pub async fn confirm_and_place_order(
        &self,
        payment_method: &str,
    ) -> Result<CreatedOrder, CheckoutError> {
        let mut inner = self.inner.lock().await;
        if inner.state != CheckoutState::IntentReady {
            return Err(CheckoutError::InvalidOperation(format!(
                "cannot confirm a charge from state {:?}",
                inner.state
            )));
        }

        let (items, shipping) = self.checkout_inputs().await?;

        let live = CartFingerprint::of(&items);
        let stale = inner
            .intent
            .as_ref()
            .map(|bound| bound.fingerprint != live)
            .unwrap_or(true);
        if stale {
            info!("cart changed after the intent was issued; requesting a fresh intent");
            self.request_intent_locked(&mut inner, &items).await?;
        }
        let bound = inner.intent.clone().ok_or_else(|| {
            CheckoutError::InvalidOperation("no payment intent available".to_string())
        })?;

        inner.state = CheckoutState::Confirming;
        let confirmed = self
            .gateway
            .confirm_charge(&bound.intent.client_secret, payment_method)
            .await;

        let outcome = match confirmed {
            Ok(outcome) if outcome.succeeded() => outcome,
            Ok(outcome) => {
                let reason = format!("charge {} returned status {}", outcome.id, outcome.status);
                self.fail_payment(&mut inner, reason.clone()).await;
                return Err(CheckoutError::GatewayDeclined(reason));
            }
            Err(err) => {
                self.fail_payment(&mut inner, err.to_string()).await;
                return Err(err);
            }
        };

        inner.state = CheckoutState::PaymentSucceeded {
            charge_id: outcome.id.clone(),
        };
        inner.intent = None; // an intent is redeemable once
        self.event_sender
            .send_or_log(Event::PaymentCaptured {
                charge_id: outcome.id.clone(),
            })
            .await;

        // The backend-issued summary is canonical for the order record;
        // local recomputation is never trusted past this point.
        let draft = OrderDraft::assemble(
            shipping,
            &items,
            PaymentInfo::captured(outcome.id.clone()),
            &bound.intent.order_summary,
        );
        self.submit_order(&mut inner, draft, outcome.id).await
    }

    /// Retries order creation after a partial failure, reusing the
    /// retained draft and the captured charge id as the idempotency key.
    /// The gateway is never touched again for this attempt.
    #[instrument(skip(self))]
    pub async fn retry_order_creation(&self) -> Result<CreatedOrder, CheckoutError> {
        let mut inner = self.inner.lock().await;
        if !matches!(inner.state, CheckoutState::OrderCreationFailed { .. }) {
            return Err(CheckoutError::InvalidOperation(format!(
                "no failed order creation to retry from state {:?}",
                inner.state
            )));
        }

        let pending = inner.pending.clone().ok_or_else(|| {
            CheckoutError::InvalidOperation("no partial charge recorded".to_string())
        })?;
        self.submit_order(&mut inner, pending.draft, pending.charge_id)
            .await
    }

    /// Abandons the attempt. Legal only while nothing external happened
    /// (or after the order exists); once a charge is captured the
    /// machine must reach `OrderCreated` or stay in
    /// `OrderCreationFailed` until reconciled.
    #[instrument(skip(self))]
    pub async fn abandon(&self) -> Result<(), CheckoutError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CheckoutState::Idle
            | CheckoutState::IntentRequested
            | CheckoutState::IntentReady
            | CheckoutState::PaymentFailed { .. }
            | CheckoutState::OrderCreated { .. } => {
                inner.state = CheckoutState::Idle;
                inner.intent = None;
                Ok(())
            }
            CheckoutState::Confirming
            | CheckoutState::PaymentSucceeded { .. }
            | CheckoutState::OrderCreationFailed { .. } => Err(CheckoutError::InvalidOperation(
                "a captured charge must be recorded as an order before checkout can be abandoned"
                    .to_string(),
            )),
        }
    }

    /// Gate shared by both payment paths: non-empty cart and a valid
    /// shipping profile, checked before any network call.
    async fn checkout_inputs(&self) -> Result<(Vec<CartItem>, ShippingInfo), CheckoutError> {
        let items = self.cart.items().await;
        if items.is_empty() {
            return Err(CheckoutError::Validation("cart is empty".to_string()));
        }

        let shipping = self.shipping.get().await.ok_or_else(|| {
            CheckoutError::Validation("shipping profile is missing".to_string())
        })?;
        let report = shipping.validate();
        if !report.valid {
            return Err(CheckoutError::Validation(report.reasons.join("; ")));
        }

        Ok((items, shipping))
    }

    async fn request_intent_locked(
        &self,
        inner: &mut CheckoutInner,
        items: &[CartItem],
    ) -> Result<TotalsSnapshot, CheckoutError> {
        inner.state = CheckoutState::IntentRequested;
        inner.intent = None;
        self.event_sender.send_or_log(Event::IntentRequested).await;

        let intent_items: Vec<IntentItem> = items.iter().map(IntentItem::from).collect();
        let shipping_fee = self.totals.shipping_fee(self.totals.items_price(items));

        match self.gateway.request_intent(&intent_items, shipping_fee).await {
            Ok(intent) => {
                let summary = intent.order_summary.clone();
                inner.intent = Some(BoundIntent {
                    intent,
                    fingerprint: CartFingerprint::of(items),
                });
                inner.state = CheckoutState::IntentReady;
                self.event_sender
                    .send_or_log(Event::IntentReady {
                        total: summary.total_price,
                    })
                    .await;
                Ok(summary)
            }
            Err(err) => {
                inner.state = CheckoutState::Idle;
                warn!("payment intent request failed: {}", err);
                Err(err)
            }
        }
    }

    async fn fail_payment(&self, inner: &mut CheckoutInner, reason: String) {
        inner.state = CheckoutState::PaymentFailed {
            reason: reason.clone(),
        };
        // A declined or abandoned secret may already have consumed
        // authorization state; it is never reused.
        inner.intent = None;
        self.event_sender
            .send_or_log(Event::PaymentFailed { reason })
            .await;
    }

    async fn submit_order(
        &self,
        inner: &mut CheckoutInner,
        draft: OrderDraft,
        charge_id: String,
    ) -> Result<CreatedOrder, CheckoutError> {
        match self.orders.create(&draft, &charge_id).await {
            Ok(order) => {
                inner.state = CheckoutState::OrderCreated {
                    order_id: order.id.clone(),
                };
                inner.pending = None;
                self.finish_order(&order).await;
                Ok(order)
            }
            Err(err) => {
                let message = err.to_string();
                error!(
                    %charge_id,
                    "charge captured but order creation failed: {}", message
                );
                inner.state = CheckoutState::OrderCreationFailed {
                    charge_id: charge_id.clone(),
                };
                inner.pending = Some(PartialCharge {
                    charge_id: charge_id.clone(),
                    draft,
                    failed_at: Utc::now(),
                    last_error: message.clone(),
                });
                self.event_sender
                    .send_or_log(Event::OrderCreationFailed {
                        charge_id: charge_id.clone(),
                    })
                    .await;
                Err(CheckoutError::OrderCreationFailed { charge_id, message })
            }
        }
    }

    async fn finish_order(&self, order: &CreatedOrder) {
        if let Err(err) = self.cart.clear().await {
            warn!("order {} created but cart clear failed: {}", order.id, err);
        }
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id.clone(),
            })
            .await;
        info!(order_id = %order.id, "order created");
    }
}
