//! Saga lifecycle events, fanned out over an mpsc channel so the HTTP path
//! never blocks on consumers.

use crate::saga::SagaStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SagaStarted {
        saga_id: Uuid,
        service_ids: Vec<String>,
        start_at: DateTime<Utc>,
    },
    BookingCreated {
        saga_id: Uuid,
        booking_id: String,
        customer_id: String,
    },
    CardTokenized {
        saga_id: Uuid,
    },
    PaymentCharged {
        saga_id: Uuid,
        payment_id: String,
        amount: i64,
        currency: String,
    },
    SagaCompleted {
        saga_id: Uuid,
        booking_id: String,
        payment_id: String,
    },
    SagaFailed {
        saga_id: Uuid,
        step: SagaStep,
        reason: String,
        /// Present when the failure left an unpaid booking behind
        booking_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; a full or closed channel is logged, never propagated,
    /// so event delivery can't fail a saga.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!("event channel closed, dropping event: {}", err);
        }
    }
}

/// Consumer loop, spawned once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::SagaStarted {
                saga_id,
                service_ids,
                start_at,
            } => info!(%saga_id, ?service_ids, %start_at, "saga started"),
            Event::BookingCreated {
                saga_id,
                booking_id,
                customer_id,
            } => info!(%saga_id, %booking_id, %customer_id, "booking created"),
            Event::CardTokenized { saga_id } => info!(%saga_id, "card tokenized"),
            Event::PaymentCharged {
                saga_id,
                payment_id,
                amount,
                currency,
            } => info!(%saga_id, %payment_id, amount = *amount, %currency, "deposit charged"),
            Event::SagaCompleted {
                saga_id,
                booking_id,
                payment_id,
            } => info!(%saga_id, %booking_id, %payment_id, "saga completed"),
            Event::SagaFailed {
                saga_id,
                step,
                reason,
                booking_id,
            } => error!(%saga_id, %step, %reason, ?booking_id, "saga failed"),
        }
    }
}
