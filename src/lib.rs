//! Storefront Checkout Library
//!
//! This crate provides the checkout core of an online storefront: the
//! cart store, shipping profile, canonical totals, payment gateway
//! adapter and the checkout orchestrator that turns a cart plus address
//! into a confirmed order via cash-on-delivery or a two-phase card
//! payment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;

use config::AppConfig;
use errors::CheckoutError;
use events::{Event, EventSender};
use services::{
    CartStore, CheckoutOrchestrator, HttpCartBackend, HttpOrderService, HttpPaymentGateway,
    ShippingProfileStore, TotalsCalculator,
};

/// Session state: the injectable container holding the cart, shipping
/// profile and checkout orchestrator, wired to the HTTP collaborators
/// from configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub cart: Arc<CartStore>,
    pub shipping: Arc<ShippingProfileStore>,
    pub checkout: Arc<CheckoutOrchestrator>,
}

impl AppState {
    /// Builds the session state for one storefront session.
    ///
    /// Returns the receiving half of the event bus; spawn
    /// [`events::process_events`] on it (or consume it directly) so
    /// lifecycle events are drained.
    pub fn new(config: AppConfig) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, receiver) = EventSender::channel(config.event_buffer);

        let cart = Arc::new(CartStore::new(
            Arc::new(HttpCartBackend::new(&config)),
            event_sender.clone(),
        ));
        let shipping = Arc::new(ShippingProfileStore::new(event_sender.clone()));
        let checkout = Arc::new(CheckoutOrchestrator::new(
            cart.clone(),
            shipping.clone(),
            TotalsCalculator::from_config(&config),
            Arc::new(HttpPaymentGateway::new(&config)),
            Arc::new(HttpOrderService::new(&config)),
            event_sender.clone(),
        ));

        (
            Self {
                config: Arc::new(config),
                event_sender,
                cart,
                shipping,
                checkout,
            },
            receiver,
        )
    }

    /// Ends the session: abandons any in-flight checkout and clears the
    /// shipping profile.
    ///
    /// Fails if a captured charge is still awaiting reconciliation:
    /// session teardown must never silently drop that state.
    pub async fn reset_session(&self) -> Result<(), CheckoutError> {
        self.checkout.abandon().await?;
        self.shipping.reset().await;
        Ok(())
    }
}
