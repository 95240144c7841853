//! End-to-end saga tests against wiremock backends and a scripted provider.
//!
//! Covers the ordering invariant (no charge without a confirmed booking),
//! timeout semantics, the contact-support flagging of post-charge failures,
//! re-entrancy protection, and idempotency key hygiene across sagas.

mod common;

use assert_matches::assert_matches;
use bookset_api::audit::AuditStore;
use bookset_api::errors::ServiceError;
use bookset_api::events::Event;
use bookset_api::saga::ConfirmBooking;
use common::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn confirm_request() -> ConfirmBooking {
    ConfirmBooking {
        services: vec![service("SVC-A", 2500, 30), service("SVC-B", 3500, 45)],
        start_at: slot_start(),
        team_member_id: "tm-1".into(),
        customer: customer(),
        customer_note: Some("first visit".into()),
    }
}

#[tokio::test]
async fn happy_path_completes_charges_deposit_and_writes_audit() {
    let mut harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(booking_response_body("BKG-1", "CUST-JIT-9")),
        )
        .expect(1)
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_response_body("PAY-1", 3132)))
        .expect(1)
        .mount(&harness.payment_server)
        .await;

    let completed = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap();

    // subtotal 6000 -> fee 132, deposit 3132
    assert_eq!(completed.quote.subtotal, 6000);
    assert_eq!(completed.quote.card_fee, 132);
    assert_eq!(completed.quote.deposit_amount, 3132);
    assert_eq!(completed.quote.total_amount, 6132);
    assert_eq!(completed.quote.balance_due, 3000);
    assert_eq!(completed.booking.id, "BKG-1");
    assert_eq!(completed.payment.id, "PAY-1");

    // the charge used the customer id echoed by booking creation, the
    // payment-suffixed key and the tokenization result
    let charge_requests = harness.payment_server.received_requests().await.unwrap();
    let charge: Value = charge_requests[0].body_json().unwrap();
    assert_eq!(charge["customerDetails"]["id"], "CUST-JIT-9");
    assert_eq!(charge["sourceId"], TEST_TOKEN);
    assert_eq!(charge["amount"], 3132);
    assert_eq!(charge["locationId"], LOCATION_ID);
    assert!(charge["idempotencyKey"]
        .as_str()
        .unwrap()
        .ends_with("-payment"));

    let booking_requests = harness.booking_server.received_requests().await.unwrap();
    let booking: Value = booking_requests[0].body_json().unwrap();
    assert!(booking["idempotencyKey"]
        .as_str()
        .unwrap()
        .ends_with("-booking"));
    let segments = booking["appointment_segments"].as_array().unwrap();
    assert_eq!(segments.len(), 2);
    // back-to-back segments: second starts 30 minutes after the first
    assert_eq!(segments[0]["start_at"], "2026-09-01T09:00:00Z");
    assert_eq!(segments[1]["start_at"], "2026-09-01T09:30:00Z");

    // audit record landed under the fixed key
    let audit = harness.audit.last_completed().await.unwrap().unwrap();
    assert_eq!(audit.booking_id, "BKG-1");
    assert_eq!(audit.payment_id, "PAY-1");
    assert_eq!(audit.amount, 3132);

    // lifecycle events in saga order
    let mut kinds = Vec::new();
    while let Ok(event) = harness.events.try_recv() {
        kinds.push(match event {
            Event::SagaStarted { .. } => "started",
            Event::BookingCreated { .. } => "booking_created",
            Event::CardTokenized { .. } => "tokenized",
            Event::PaymentCharged { .. } => "charged",
            Event::SagaCompleted { .. } => "completed",
            Event::SagaFailed { .. } => "failed",
        });
    }
    assert_eq!(
        kinds,
        vec![
            "started",
            "booking_created",
            "tokenized",
            "charged",
            "completed"
        ]
    );
}

#[tokio::test]
async fn booking_failure_is_terminal_and_no_payment_is_attempted() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.payment_server)
        .await;

    let err = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::BookingCreationFailed(_));
    assert!(err.retryable_with_new_saga());
    assert!(!err.requires_support_contact());
    // no tokenization either: the saga never got past booking creation
    assert_eq!(harness.provider.tokenize_calls(), 0);
}

#[tokio::test]
async fn ambiguous_booking_response_is_treated_as_failure() {
    let harness = TestHarness::new().await;

    // 2xx but no explicit success flag
    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "booking": { "id": "BKG-GHOST", "customer_id": "C", "start_at": "2026-09-01T09:00:00Z" }
        })))
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.payment_server)
        .await;

    let err = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BookingCreationFailed(_));
    assert_eq!(harness.provider.tokenize_calls(), 0);
}

#[tokio::test]
async fn booking_timeout_fails_the_saga_before_any_payment_step() {
    let harness = TestHarness::with_booking_timeout(Duration::from_millis(100)).await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(booking_response_body("BKG-LATE", "CUST-1"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.payment_server)
        .await;

    let err = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::BookingCreationTimeout);
    assert_eq!(harness.provider.tokenize_calls(), 0);
}

#[tokio::test]
async fn tokenization_failure_is_terminal_and_never_reaches_the_charge() {
    let provider = Arc::new(ScriptedProvider::failing_tokenization(vec![
        "CVV_FAILURE".into(),
    ]));
    let harness = TestHarness::with_provider(provider.clone()).await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(booking_response_body("BKG-2", "CUST-2")),
        )
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.payment_server)
        .await;

    let err = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::TokenizationFailed(msg) if msg.contains("CVV_FAILURE"));
    assert_eq!(provider.tokenize_calls(), 1);
}

#[tokio::test]
async fn charge_rejection_is_flagged_for_support_not_retry() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(booking_response_body("BKG-3", "CUST-3")),
        )
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.payment_server)
        .await;

    let err = harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PaymentProcessingFailed(_));
    // gateway state is ambiguous: the caller must see the contact-support
    // variant, never a retry prompt
    assert!(err.requires_support_contact());
    assert!(!err.retryable_with_new_saga());

    // no audit record for the incomplete saga
    assert!(harness.audit.last_completed().await.unwrap().is_none());
}

#[tokio::test]
async fn second_confirm_while_one_is_in_flight_is_rejected() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(booking_response_body("BKG-4", "CUST-4"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_response_body("PAY-4", 3132)))
        .mount(&harness.payment_server)
        .await;

    let first = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.confirm(confirm_request()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = harness.orchestrator.clone().confirm(confirm_request()).await;
    assert_matches!(second.unwrap_err(), ServiceError::SagaInFlight);

    // the in-flight saga is unaffected by the rejected double-click
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.booking.id, "BKG-4");
}

#[tokio::test]
async fn each_saga_draws_fresh_idempotency_keys() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/bookings/self-managed/segments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(booking_response_body("BKG-5", "CUST-5")),
        )
        .mount(&harness.booking_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_response_body("PAY-5", 3132)))
        .mount(&harness.payment_server)
        .await;

    harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap();
    harness
        .orchestrator
        .clone()
        .confirm(confirm_request())
        .await
        .unwrap();

    let bookings = harness.booking_server.received_requests().await.unwrap();
    let keys: Vec<String> = bookings
        .iter()
        .map(|r| {
            r.body_json::<Value>().unwrap()["idempotencyKey"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);

    let payments = harness.payment_server.received_requests().await.unwrap();
    let payment_keys: Vec<String> = payments
        .iter()
        .map(|r| {
            r.body_json::<Value>().unwrap()["idempotencyKey"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_ne!(payment_keys[0], payment_keys[1]);
}
