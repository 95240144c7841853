//! Collision-checked, single-use idempotency tokens for the booking saga.
//!
//! Keys are marked used at draw time, before any network call that could
//! partially succeed, so a rapid double-submit can never reuse one. The set
//! is scoped to the manager's lifetime: a new process cannot physically
//! resubmit a request that was in flight in the old one.

use crate::errors::ServiceError;
use dashmap::DashSet;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

const KEY_BYTES: usize = 16;
const DEFAULT_MAX_DRAWS: u32 = 10;

const BOOKING_SUFFIX: &str = "-booking";
const PAYMENT_SUFFIX: &str = "-payment";

/// Opaque single-use token. Never reused once issued, even if the attempt
/// it was issued for failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two derived keys a saga submits: one for booking creation, one for
/// the deposit charge. Both stem from a single base draw.
#[derive(Debug, Clone)]
pub struct SagaKeys {
    pub booking: IdempotencyKey,
    pub payment: IdempotencyKey,
}

pub struct IdempotencyKeyManager {
    issued: DashSet<String>,
    max_draws: u32,
}

impl Default for IdempotencyKeyManager {
    fn default() -> Self {
        Self {
            issued: DashSet::new(),
            max_draws: DEFAULT_MAX_DRAWS,
        }
    }
}

impl IdempotencyKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 32 hex chars from the OS entropy source.
    fn generate_token() -> String {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Draw a fresh key, redrawing on collision up to the bounded attempt
    /// count. The key is recorded as used before it is handed out.
    pub fn issue(&self) -> Result<IdempotencyKey, ServiceError> {
        self.issue_from(Self::generate_token)
    }

    fn issue_from<F: FnMut() -> String>(&self, mut draw: F) -> Result<IdempotencyKey, ServiceError> {
        for _ in 0..self.max_draws {
            let token = draw();
            if self.issued.insert(token.clone()) {
                return Ok(IdempotencyKey(token));
            }
            tracing::warn!("idempotency key collision; redrawing");
        }
        Err(ServiceError::KeyExhaustion)
    }

    /// Issue the saga's derived key pair. The derived keys are recorded as
    /// used too, so neither can ever be issued as a base key later.
    pub fn issue_saga_keys(&self) -> Result<SagaKeys, ServiceError> {
        let base = self.issue()?;
        let booking = format!("{base}{BOOKING_SUFFIX}");
        let payment = format!("{base}{PAYMENT_SUFFIX}");
        self.issued.insert(booking.clone());
        self.issued.insert(payment.clone());
        Ok(SagaKeys {
            booking: IdempotencyKey(booking),
            payment: IdempotencyKey(payment),
        })
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}
