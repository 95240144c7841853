//! Shared harness for the saga and availability integration tests: wiremock
//! doubles for the scheduling and payment backends plus a scripted
//! [`PaymentProvider`] that never touches a network.

#![allow(dead_code)]

use async_trait::async_trait;
use bookset_api::audit::{AuditStore, FileAuditStore};
use bookset_api::clients::{BookingApiClient, PaymentsApiClient};
use bookset_api::events::{Event, EventSender};
use bookset_api::gateway::adapter::DEFAULT_CARD_MOUNT;
use bookset_api::gateway::{
    CardInput, GatewayTuning, PaymentGatewayAdapter, PaymentProvider, ProviderError, TokenStatus,
    TokenizeOutcome, VerificationDetails,
};
use bookset_api::models::{CustomerDetails, Service};
use bookset_api::retry::{PollPolicy, RetryPolicy};
use bookset_api::saga::BookingOrchestrator;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "cnon-test-123";
pub const LOCATION_ID: &str = "LOC-MAIN";

/// Deterministic provider double. Ready immediately by default; tokenization
/// outcome is scriptable and every call is counted.
pub struct ScriptedProvider {
    ready_after: u32,
    is_ready_calls: AtomicU32,
    create_calls: AtomicU32,
    tokenize_calls: AtomicU32,
    release_calls: AtomicU32,
    tokenize_outcome: Mutex<TokenizeOutcome>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            ready_after: 0,
            is_ready_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            tokenize_calls: AtomicU32::new(0),
            release_calls: AtomicU32::new(0),
            tokenize_outcome: Mutex::new(TokenizeOutcome {
                status: TokenStatus::Ok,
                token: Some(TEST_TOKEN.to_string()),
                errors: vec![],
            }),
        }
    }
}

impl ScriptedProvider {
    pub fn failing_tokenization(errors: Vec<String>) -> Self {
        let provider = Self::default();
        *provider.tokenize_outcome.lock().unwrap() = TokenizeOutcome {
            status: TokenStatus::Error,
            token: None,
            errors,
        };
        provider
    }

    pub fn tokenize_calls(&self) -> u32 {
        self.tokenize_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn is_ready(&self) -> bool {
        self.is_ready_calls.fetch_add(1, Ordering::SeqCst) >= self.ready_after
    }

    async fn create_card_input(&self) -> Result<CardInput, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CardInput {
            id: "card-test".into(),
        })
    }

    async fn mount_ready(&self, _mount_id: &str) -> bool {
        true
    }

    async fn attach(&self, _card: &CardInput, _mount_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn tokenize(
        &self,
        _card: &CardInput,
        _verification: &VerificationDetails,
    ) -> Result<TokenizeOutcome, ProviderError> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokenize_outcome.lock().unwrap().clone())
    }

    async fn release(&self, _card: CardInput) -> Result<(), ProviderError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn fast_tuning() -> GatewayTuning {
    GatewayTuning {
        sdk_poll: PollPolicy::new(3, Duration::from_millis(1)),
        mount_poll: PollPolicy::new(3, Duration::from_millis(1)),
        card_create: RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(1)),
        attach: RetryPolicy::new(2, Duration::from_millis(100), Duration::from_millis(1)),
    }
}

pub struct TestHarness {
    pub booking_server: MockServer,
    pub payment_server: MockServer,
    pub provider: Arc<ScriptedProvider>,
    pub gateway: Arc<PaymentGatewayAdapter>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub bookings_client: Arc<BookingApiClient>,
    pub audit: Arc<FileAuditStore>,
    pub audit_path: PathBuf,
    pub events: mpsc::Receiver<Event>,
    _audit_dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_options(Duration::from_secs(5), Arc::new(ScriptedProvider::default())).await
    }

    pub async fn with_booking_timeout(timeout: Duration) -> Self {
        Self::with_options(timeout, Arc::new(ScriptedProvider::default())).await
    }

    pub async fn with_provider(provider: Arc<ScriptedProvider>) -> Self {
        Self::with_options(Duration::from_secs(5), provider).await
    }

    async fn with_options(booking_timeout: Duration, provider: Arc<ScriptedProvider>) -> Self {
        let booking_server = MockServer::start().await;
        let payment_server = MockServer::start().await;

        let gateway = Arc::new(PaymentGatewayAdapter::new(provider.clone(), fast_tuning()));
        gateway
            .initialize(DEFAULT_CARD_MOUNT)
            .await
            .expect("test gateway bootstrap");

        let bookings_client =
            Arc::new(BookingApiClient::new(booking_server.uri(), booking_timeout).unwrap());
        let payments_client =
            Arc::new(PaymentsApiClient::new(payment_server.uri(), Duration::from_secs(5)).unwrap());

        let audit_dir = TempDir::new().unwrap();
        let audit_path = audit_dir.path().join("audit.json");
        let audit = Arc::new(FileAuditStore::new(&audit_path));

        let (event_tx, events) = mpsc::channel(64);
        let audit_store: Arc<dyn AuditStore> = audit.clone();
        let orchestrator = Arc::new(BookingOrchestrator::new(
            gateway.clone(),
            bookings_client.clone(),
            payments_client,
            audit_store,
            EventSender::new(event_tx),
            LOCATION_ID,
        ));

        Self {
            booking_server,
            payment_server,
            provider,
            gateway,
            orchestrator,
            bookings_client,
            audit,
            audit_path,
            events,
            _audit_dir: audit_dir,
        }
    }
}

pub fn service(id: &str, price: i64, duration_minutes: i64) -> Service {
    Service {
        id: id.into(),
        name: format!("Service {id}"),
        price,
        duration_minutes,
        currency: "AUD".into(),
    }
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        id: Some("CUST-PRE-1".into()),
        given_name: "Ada".into(),
        family_name: "Lovelace".into(),
        email_address: "ada@example.com".into(),
        phone_number: Some("+61400000000".into()),
    }
}

pub fn slot_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-09-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn booking_response_body(booking_id: &str, customer_id: &str) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "booking": {
            "id": booking_id,
            "customer_id": customer_id,
            "start_at": "2026-09-01T09:00:00Z",
            "location_id": LOCATION_ID,
            "status": "ACCEPTED",
            "version": 1
        }
    })
}

pub fn payment_response_body(payment_id: &str, amount: i64) -> serde_json::Value {
    serde_json::json!({
        "payment": {
            "id": payment_id,
            "amount": amount,
            "currency": "AUD",
            "receipt_url": format!("https://receipts.example/r/{payment_id}")
        }
    })
}
