use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{
    CreateSessionRequest, LineItem, PaymentGateway, WebhookEvent, CHECKOUT_COMPLETED,
};
use crate::services::cart::Cart;
use crate::services::catalog::CatalogService;
use crate::services::orders::OrderService;

/// Where to send the customer after checkout begins.
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutRedirect {
    pub order_id: i64,
    pub redirect_url: String,
}

/// Result of confirming a checkout via the success redirect.
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutConfirmation {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub paid: bool,
    /// True when this confirmation performed the paid transition itself
    /// rather than observing one already made.
    pub newly_paid: bool,
}

/// How an inbound webhook notification was handled. Every variant is
/// acknowledged to the sender; the distinction is for logging and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    MarkedPaid,
    AlreadyPaid,
    Ignored,
    MissingOrderRef,
    OrderNotFound,
    PersistenceFailure,
}

/// Orchestrates the checkout flow: cart to pending order to hosted
/// payment session, then confirmation by redirect or webhook.
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    orders: Arc<OrderService>,
    catalog: Arc<CatalogService>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        orders: Arc<OrderService>,
        catalog: Arc<CatalogService>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            orders,
            catalog,
            gateway,
            events,
            config,
        }
    }

    /// Converts a decimal price to gateway minor units (cents).
    fn minor_units(price: Decimal) -> i64 {
        (price * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    /// Begins checkout: snapshots the cart into a pending order within
    /// one transaction, then creates the hosted payment session. The
    /// pending order survives a gateway failure so the attempt can be
    /// retried or reconciled later.
    pub async fn initiate_checkout(
        &self,
        user_id: Option<i64>,
        cart: &Cart,
    ) -> Result<CheckoutRedirect, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let txn = self.db.begin().await?;

        let order = self.orders.create_pending(&txn, user_id).await?;
        let mut line_items = Vec::with_capacity(cart.len());
        let mut total = Decimal::ZERO;

        for (product_id, quantity) in cart.entries() {
            // Entries that no longer resolve are skipped; the order holds
            // only what can actually be sold.
            let Some(product) = self.catalog.get_by_id_with(&txn, product_id).await? else {
                debug!(product_id, "Skipping stale cart entry during checkout");
                continue;
            };
            total += self
                .orders
                .attach_item(&txn, order.id, &product, quantity)
                .await?;
            line_items.push(LineItem {
                name: product.name,
                description: product.description,
                unit_amount: Self::minor_units(product.price),
                quantity,
            });
        }

        self.orders.finalize_total(&txn, order.id, total).await?;
        txn.commit().await?;

        self.events
            .send_or_log(Event::OrderCreated { order_id: order.id })
            .await;

        let success_url = format!(
            "{}/api/v1/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
            self.config.base_url, order.id
        );
        let cancel_url = format!("{}/api/v1/cart", self.config.base_url);

        let session = self
            .gateway
            .create_session(&CreateSessionRequest {
                line_items,
                success_url,
                cancel_url,
                currency: self.config.currency.clone(),
                order_id: order.id,
            })
            .await?;

        self.orders.store_session_ref(order.id, &session.id).await?;
        self.events
            .send_or_log(Event::CheckoutStarted { order_id: order.id })
            .await;

        Ok(CheckoutRedirect {
            order_id: order.id,
            redirect_url: session.url,
        })
    }

    /// Confirms payment on the customer's return from the hosted page.
    /// The session is re-fetched server-side; the redirect itself proves
    /// nothing. Safe to repeat and safe to race with the webhook.
    pub async fn confirm_success_redirect(
        &self,
        session_id: &str,
        order_id: i64,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let order = self.orders.get(order_id).await?;
        match order.checkout_session_id.as_deref() {
            Some(stored) if stored != session_id => {
                return Err(ServiceError::BadRequest(
                    "Session does not belong to this order".to_string(),
                ));
            }
            _ => {}
        }

        let status = self.gateway.retrieve_session(session_id).await?;

        let mut newly_paid = false;
        if status.is_paid() {
            newly_paid = self
                .orders
                .mark_paid(order_id, status.payment_intent.as_deref())
                .await?;
            if newly_paid {
                self.events
                    .send_or_log(Event::OrderPaid {
                        order_id,
                        payment_intent: status.payment_intent.clone(),
                    })
                    .await;
            }
        }

        let order = self.orders.get(order_id).await?;
        let items = self.orders.items_for(order_id).await?;
        let paid = order.is_paid();

        Ok(CheckoutConfirmation {
            order,
            items,
            paid,
            newly_paid,
        })
    }

    /// Applies a verified webhook notification. Always resolves to an
    /// outcome; the HTTP layer acknowledges regardless, so the sender
    /// never retries events we have consciously disposed of.
    pub async fn apply_webhook_event(&self, event: &WebhookEvent) -> WebhookOutcome {
        if event.event_type != CHECKOUT_COMPLETED {
            debug!(event_type = %event.event_type, "Ignoring webhook event type");
            return WebhookOutcome::Ignored;
        }

        // Only the order id carried in session metadata is trusted; an
        // event without one is acknowledged and dropped.
        let Some(order_id) = event.order_id else {
            warn!("Webhook event carries no order reference");
            return WebhookOutcome::MissingOrderRef;
        };

        match self.orders.get(order_id).await {
            Ok(_) => {}
            Err(ServiceError::NotFound(_)) => {
                warn!(order_id, "Webhook references unknown order");
                return WebhookOutcome::OrderNotFound;
            }
            Err(e) => {
                error!(order_id, "Webhook order fetch failed: {}", e);
                return WebhookOutcome::PersistenceFailure;
            }
        }

        match self
            .orders
            .mark_paid(order_id, event.payment_intent.as_deref())
            .await
        {
            Ok(true) => {
                self.events
                    .send_or_log(Event::OrderPaid {
                        order_id,
                        payment_intent: event.payment_intent.clone(),
                    })
                    .await;
                WebhookOutcome::MarkedPaid
            }
            Ok(false) => WebhookOutcome::AlreadyPaid,
            Err(e) => {
                error!(order_id, "Webhook payment persistence failed: {}", e);
                WebhookOutcome::PersistenceFailure
            }
        }
    }
}
