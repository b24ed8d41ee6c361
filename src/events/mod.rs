use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Domain events emitted by the order flow. Consumers run off the request
/// path; emitting never blocks a handler.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CheckoutStarted {
        order_id: i64,
    },
    OrderCreated {
        order_id: i64,
    },
    OrderPaid {
        order_id: i64,
        payment_intent: Option<String>,
    },
    OrderStatusChanged {
        order_id: i64,
        old_status: String,
        new_status: String,
    },
}

/// Cloneable handle for emitting events into the processing channel.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Emits an event, logging instead of failing when the channel is
    /// closed or full. Event loss never fails the surrounding operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            error!("Failed to emit event: {}", e);
        }
    }
}

/// Creates the event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, recording each event in the structured log.
/// Runs as a background task for the life of the process.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::CheckoutStarted { order_id } => {
                info!(order_id, "Checkout started");
            }
            Event::OrderCreated { order_id } => {
                info!(order_id, "Order created");
            }
            Event::OrderPaid {
                order_id,
                payment_intent,
            } => {
                info!(order_id, payment_intent = ?payment_intent, "Order paid");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, %old_status, %new_status, "Order status changed");
            }
        }
    }
}
