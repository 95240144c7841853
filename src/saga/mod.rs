//! The booking-payment saga: a linear sequence of externally-committed side
//! effects with no atomic rollback across them. Each instance is transient
//! and terminal — a failed saga is never resumed, a new one (with fresh
//! idempotency keys) is started instead.

pub mod orchestrator;

pub use orchestrator::{BookingOrchestrator, CompletedBooking, ConfirmBooking};

use crate::idempotency::SagaKeys;
use crate::models::{BookingRecord, CustomerDetails, PaymentRecord, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Saga steps, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    GenerateKeys,
    CreateBooking,
    TokenizeCard,
    ChargeDeposit,
    AttachPayment,
}

/// Linear happy path with a single absorbing failure state. `Failed` is
/// terminal for the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SagaState {
    Idle,
    KeyGenerated,
    BookingCreated,
    CardTokenized,
    PaymentCharged,
    Completed,
    Failed { step: SagaStep, reason: String },
}

/// In-memory saga instance: created when the customer confirms a slot,
/// dropped on completion or terminal failure.
#[derive(Debug, Clone)]
pub struct BookingSaga {
    pub id: Uuid,
    pub services: Vec<Service>,
    pub start_at: DateTime<Utc>,
    pub team_member_id: String,
    pub customer: CustomerDetails,
    pub keys: Option<SagaKeys>,
    pub booking: Option<BookingRecord>,
    pub payment: Option<PaymentRecord>,
    pub state: SagaState,
}

impl BookingSaga {
    pub fn new(
        services: Vec<Service>,
        start_at: DateTime<Utc>,
        team_member_id: String,
        customer: CustomerDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            services,
            start_at,
            team_member_id,
            customer,
            keys: None,
            booking: None,
            payment: None,
            state: SagaState::Idle,
        }
    }
}
