//! Bootstrap state machine over a [`PaymentProvider`]: produces a
//! ready-to-tokenize card input while hiding SDK load nondeterminism behind
//! bounded polling and retries.

use super::{CardInput, PaymentProvider, TokenStatus, VerificationDetails};
use crate::errors::ServiceError;
use crate::retry::{PollPolicy, RetryPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default mount target id for the hosted card input.
pub const DEFAULT_CARD_MOUNT: &str = "card-container";

/// Bootstrap steps, in order. Also names the step inside an error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum AdapterStep {
    WaitingForSdk,
    CreatingCardInstance,
    AttachingToMount,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterState {
    Uninitialized,
    WaitingForSdk,
    CreatingCardInstance,
    AttachingToMount,
    Ready,
    Error { step: AdapterStep, message: String },
}

/// Retry and polling bounds for each bootstrap step. `Default` carries the
/// production numbers; tests shrink them.
#[derive(Debug, Clone)]
pub struct GatewayTuning {
    /// SDK readiness probe: 20 attempts, 750ms apart
    pub sdk_poll: PollPolicy,
    /// Mount readiness probe
    pub mount_poll: PollPolicy,
    /// Card factory: 10s per attempt, 3 attempts, short backoff
    pub card_create: RetryPolicy,
    /// Attach: 8s per attempt, one retry
    pub attach: RetryPolicy,
}

impl Default for GatewayTuning {
    fn default() -> Self {
        Self {
            sdk_poll: PollPolicy::new(20, Duration::from_millis(750)),
            mount_poll: PollPolicy::new(10, Duration::from_millis(200)),
            card_create: RetryPolicy::new(3, Duration::from_secs(10), Duration::from_millis(250)),
            attach: RetryPolicy::new(2, Duration::from_secs(8), Duration::from_millis(250)),
        }
    }
}

pub struct PaymentGatewayAdapter {
    provider: Arc<dyn PaymentProvider>,
    tuning: GatewayTuning,
    state: Mutex<AdapterState>,
    card: Mutex<Option<CardInput>>,
    init_attempted: AtomicBool,
    released: AtomicBool,
}

impl PaymentGatewayAdapter {
    pub fn new(provider: Arc<dyn PaymentProvider>, tuning: GatewayTuning) -> Self {
        Self {
            provider,
            tuning,
            state: Mutex::new(AdapterState::Uninitialized),
            card: Mutex::new(None),
            init_attempted: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> AdapterState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_state(&self, next: AdapterState) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = next;
    }

    fn take_card(&self) -> Option<CardInput> {
        match self.card.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn store_card(&self, card: CardInput) {
        let mut guard = match self.card.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(card);
    }

    fn current_card(&self) -> Option<CardInput> {
        match self.card.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn fail(&self, step: AdapterStep, error: ServiceError) -> ServiceError {
        error!(step = %step, %error, "gateway bootstrap failed");
        self.set_state(AdapterState::Error {
            step,
            message: error.to_string(),
        });
        error
    }

    /// Run the bootstrap sequence to `Ready`. Attempted at most once per
    /// adapter instance; re-render churn calling in twice gets an error, and
    /// recovering from a failed bootstrap means building a fresh adapter.
    #[instrument(skip(self))]
    pub async fn initialize(&self, mount_id: &str) -> Result<(), ServiceError> {
        if self.init_attempted.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::InvalidOperation(
                "payment gateway adapter is already initializing or initialized".into(),
            ));
        }

        self.set_state(AdapterState::WaitingForSdk);
        let provider = self.provider.clone();
        self.tuning
            .sdk_poll
            .wait_until("payment sdk readiness", || {
                let provider = provider.clone();
                async move { provider.is_ready().await }
            })
            .await
            .map_err(|_| self.fail(AdapterStep::WaitingForSdk, ServiceError::SdkLoadTimeout))?;

        self.set_state(AdapterState::CreatingCardInstance);
        let provider = self.provider.clone();
        let card = self
            .tuning
            .card_create
            .run("create card input", || {
                let provider = provider.clone();
                async move { provider.create_card_input().await }
            })
            .await
            .map_err(|err| {
                self.fail(
                    AdapterStep::CreatingCardInstance,
                    ServiceError::CardCreationFailed(err.to_string()),
                )
            })?;

        self.set_state(AdapterState::AttachingToMount);
        let provider = self.provider.clone();
        let mount = mount_id.to_string();
        self.tuning
            .mount_poll
            .wait_until("card mount readiness", || {
                let provider = provider.clone();
                let mount = mount.clone();
                async move { provider.mount_ready(&mount).await }
            })
            .await
            .map_err(|err| {
                self.fail(
                    AdapterStep::AttachingToMount,
                    ServiceError::CardAttachFailed(err.to_string()),
                )
            })?;

        let provider = self.provider.clone();
        let attach_card = card.clone();
        let mount = mount_id.to_string();
        self.tuning
            .attach
            .run("attach card input", || {
                let provider = provider.clone();
                let card = attach_card.clone();
                let mount = mount.clone();
                async move { provider.attach(&card, &mount).await }
            })
            .await
            .map_err(|err| {
                self.fail(
                    AdapterStep::AttachingToMount,
                    ServiceError::CardAttachFailed(err.to_string()),
                )
            })?;

        self.store_card(card);
        self.set_state(AdapterState::Ready);
        info!("payment gateway ready");
        Ok(())
    }

    /// Tokenize entered card data. Failures are surfaced verbatim and never
    /// retried here: a failed tokenization usually means invalid card data
    /// and control must return to the customer.
    pub async fn tokenize(&self, verification: &VerificationDetails) -> Result<String, ServiceError> {
        let card = match self.state() {
            AdapterState::Ready => self.current_card().ok_or_else(|| {
                ServiceError::InternalError("adapter ready without a card input".into())
            })?,
            AdapterState::Error { step, message } => {
                return Err(ServiceError::InvalidOperation(format!(
                    "payment gateway failed during {step}: {message}"
                )))
            }
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "payment gateway is not ready (state: {other:?})"
                )))
            }
        };

        let outcome = self
            .provider
            .tokenize(&card, verification)
            .await
            .map_err(|err| ServiceError::TokenizationFailed(err.to_string()))?;

        match (outcome.status, outcome.token) {
            (TokenStatus::Ok, Some(token)) => Ok(token),
            (TokenStatus::Ok, None) => Err(ServiceError::TokenizationFailed(
                "gateway returned OK without a token".into(),
            )),
            (TokenStatus::Error, _) => Err(ServiceError::TokenizationFailed(
                if outcome.errors.is_empty() {
                    "card verification failed".to_string()
                } else {
                    outcome.errors.join("; ")
                },
            )),
        }
    }

    /// Release the underlying card resource. Safe to call any number of
    /// times; only the first call reaches the provider.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(card) = self.take_card() {
            if let Err(err) = self.provider.release(card).await {
                warn!(%err, "failed to release card input");
            }
        }
    }
}
