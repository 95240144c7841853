//! Saga controller. Executes "create booking (unpaid)" → "tokenize card" →
//! "charge deposit" → "attach payment" strictly in order, each step awaited
//! to resolution before the next starts, and surfaces one terminal
//! success/failure to the caller.

use crate::audit::{AuditRecord, AuditStore};
use crate::availability::build_segments;
use crate::clients::payments::PaymentCustomer;
use crate::clients::{
    BookingApiClient, CreateBookingRequest, PaymentsApiClient, ProcessPaymentRequest,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{PaymentGatewayAdapter, PaymentIntent, VerificationDetails};
use crate::idempotency::IdempotencyKeyManager;
use crate::models::{CustomerDetails, Service};
use crate::pricing::{self, DepositQuote};
use crate::saga::{BookingSaga, SagaState, SagaStep};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A confirmed slot plus payer, as submitted by the customer.
#[derive(Debug, Clone)]
pub struct ConfirmBooking {
    pub services: Vec<Service>,
    pub start_at: DateTime<Utc>,
    pub team_member_id: String,
    pub customer: CustomerDetails,
    pub customer_note: Option<String>,
}

/// Terminal success bundle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletedBooking {
    pub saga_id: Uuid,
    pub booking: crate::models::BookingRecord,
    pub payment: crate::models::PaymentRecord,
    pub quote: DepositQuote,
}

pub struct BookingOrchestrator {
    keys: IdempotencyKeyManager,
    gateway: Arc<PaymentGatewayAdapter>,
    bookings: Arc<BookingApiClient>,
    payments: Arc<PaymentsApiClient>,
    audit: Arc<dyn AuditStore>,
    events: EventSender,
    location_id: String,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the saga task finishes, however it exits.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BookingOrchestrator {
    pub fn new(
        gateway: Arc<PaymentGatewayAdapter>,
        bookings: Arc<BookingApiClient>,
        payments: Arc<PaymentsApiClient>,
        audit: Arc<dyn AuditStore>,
        events: EventSender,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            keys: IdempotencyKeyManager::new(),
            gateway,
            bookings,
            payments,
            audit,
            events,
            location_id: location_id.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one saga to its terminal state.
    ///
    /// A second confirmation while one is in flight is rejected without
    /// consuming keys (the confirm button can be double-clicked). The saga
    /// itself runs on a detached task: once the booking exists it proceeds
    /// to a terminal state even if the caller goes away, so a half-charged
    /// state is never abandoned without a record.
    #[instrument(skip(self, request), fields(team_member_id = %request.team_member_id))]
    pub async fn confirm(
        self: Arc<Self>,
        request: ConfirmBooking,
    ) -> Result<CompletedBooking, ServiceError> {
        request.customer.validate()?;
        if request.services.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one service must be selected".into(),
            ));
        }
        for service in &request.services {
            service.validate()?;
        }

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::SagaInFlight);
        }
        let guard = InFlightGuard(self.in_flight.clone());

        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run_saga(request).await
        });

        handle
            .await
            .map_err(|e| ServiceError::InternalError(format!("saga task failed: {e}")))?
    }

    async fn run_saga(&self, request: ConfirmBooking) -> Result<CompletedBooking, ServiceError> {
        let mut saga = BookingSaga::new(
            request.services.clone(),
            request.start_at,
            request.team_member_id.clone(),
            request.customer.clone(),
        );

        match self.drive(&mut saga, &request).await {
            Ok(done) => {
                saga.state = SagaState::Completed;
                self.events
                    .send(Event::SagaCompleted {
                        saga_id: saga.id,
                        booking_id: done.booking.id.clone(),
                        payment_id: done.payment.id.clone(),
                    })
                    .await;
                info!(saga_id = %saga.id, "booking saga completed");
                Ok(done)
            }
            Err((step, error)) => {
                saga.state = SagaState::Failed {
                    step,
                    reason: error.to_string(),
                };
                self.events
                    .send(Event::SagaFailed {
                        saga_id: saga.id,
                        step,
                        reason: error.to_string(),
                        booking_id: saga.booking.as_ref().map(|b| b.id.clone()),
                    })
                    .await;
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        saga: &mut BookingSaga,
        request: &ConfirmBooking,
    ) -> Result<CompletedBooking, (SagaStep, ServiceError)> {
        // Keys are recorded as used at draw time, before any network call,
        // so a rapid double-submit can never reuse them.
        let keys = self
            .keys
            .issue_saga_keys()
            .map_err(|e| (SagaStep::GenerateKeys, e))?;
        saga.keys = Some(keys.clone());
        saga.state = SagaState::KeyGenerated;

        self.events
            .send(Event::SagaStarted {
                saga_id: saga.id,
                service_ids: request.services.iter().map(|s| s.id.clone()).collect(),
                start_at: request.start_at,
            })
            .await;

        let segments = build_segments(
            request.start_at,
            &request.services,
            &request.team_member_id,
        );
        let booking = self
            .bookings
            .create_booking(&CreateBookingRequest {
                start_at: request.start_at,
                appointment_segments: &segments,
                customer_note: request.customer_note.as_deref(),
                customer: &request.customer,
                idempotency_key: keys.booking.as_str(),
            })
            .await
            .map_err(|e| (SagaStep::CreateBooking, e))?;
        saga.booking = Some(booking.clone());
        saga.state = SagaState::BookingCreated;
        self.events
            .send(Event::BookingCreated {
                saga_id: saga.id,
                booking_id: booking.id.clone(),
                customer_id: booking.customer_id.clone(),
            })
            .await;

        let quote = pricing::quote(&request.services).map_err(|e| (SagaStep::TokenizeCard, e))?;
        let token = self
            .gateway
            .tokenize(&VerificationDetails {
                amount: quote.deposit_amount,
                currency: quote.currency.clone(),
                intent: PaymentIntent::Charge,
                billing_contact: request.customer.clone(),
            })
            .await
            .map_err(|e| (SagaStep::TokenizeCard, e))?;
        saga.state = SagaState::CardTokenized;
        self.events
            .send(Event::CardTokenized { saga_id: saga.id })
            .await;

        // The payer identity may have been created or relinked during
        // booking creation; the charge must use the id echoed back there,
        // not the pre-booking one.
        let payment = self
            .payments
            .process_payment(&ProcessPaymentRequest {
                source_id: &token,
                amount: quote.deposit_amount,
                currency: &quote.currency,
                idempotency_key: keys.payment.as_str(),
                location_id: &self.location_id,
                customer_details: PaymentCustomer {
                    id: &booking.customer_id,
                    email_address: &request.customer.email_address,
                    given_name: &request.customer.given_name,
                    family_name: &request.customer.family_name,
                },
            })
            .await
            .map_err(|e| (SagaStep::ChargeDeposit, e))?;
        saga.payment = Some(payment.clone());
        saga.state = SagaState::PaymentCharged;
        self.events
            .send(Event::PaymentCharged {
                saga_id: saga.id,
                payment_id: payment.id.clone(),
                amount: payment.amount,
                currency: payment.currency.clone(),
            })
            .await;

        let record = AuditRecord {
            saga_id: saga.id,
            booking_id: booking.id.clone(),
            payment_id: payment.id.clone(),
            receipt_url: payment.receipt_url.clone(),
            service_names: request.services.iter().map(|s| s.name.clone()).collect(),
            team_member_id: request.team_member_id.clone(),
            start_at: request.start_at,
            amount: quote.deposit_amount,
            currency: quote.currency.clone(),
            completed_at: Utc::now(),
        };
        self.audit.record_completed(&record).await.map_err(|e| {
            (
                SagaStep::AttachPayment,
                ServiceError::PaymentAttachFailed(e.to_string()),
            )
        })?;

        Ok(CompletedBooking {
            saga_id: saga.id,
            booking,
            payment,
            quote,
        })
    }
}
