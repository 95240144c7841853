//! Payment gateway abstraction. The card-processing SDK is reached only
//! through the [`PaymentProvider`] trait so the saga and adapter can be
//! exercised against a test double that never touches a network.

pub mod adapter;
pub mod http_provider;

pub use adapter::{AdapterState, AdapterStep, GatewayTuning, PaymentGatewayAdapter};
pub use http_provider::HttpPaymentProvider;

use crate::models::CustomerDetails;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Handle to a provider-side card input instance. The adapter owns exactly
/// one and must release it on teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInput {
    pub id: String,
}

/// What the charge token is being requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentIntent {
    Charge,
    Store,
}

/// Buyer verification payload passed to tokenization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationDetails {
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub intent: PaymentIntent,
    pub billing_contact: CustomerDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenStatus {
    Ok,
    Error,
}

/// Result of a tokenization attempt. A non-OK status usually means invalid
/// card data; the errors are surfaced to the customer verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeOutcome {
    pub status: TokenStatus,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

/// The gateway surface the adapter drives. Readiness is not synchronously
/// observable: `is_ready` and `mount_ready` are polled with bounded budgets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// SDK bootstrap probe; false until the gateway is loaded.
    async fn is_ready(&self) -> bool;

    /// Card input factory.
    async fn create_card_input(&self) -> Result<CardInput, ProviderError>;

    /// Whether the UI mount target exists yet.
    async fn mount_ready(&self, mount_id: &str) -> bool;

    /// Bind the card input to its mount.
    async fn attach(&self, card: &CardInput, mount_id: &str) -> Result<(), ProviderError>;

    /// Exchange entered card data for an opaque single-use charge token.
    async fn tokenize(
        &self,
        card: &CardInput,
        verification: &VerificationDetails,
    ) -> Result<TokenizeOutcome, ProviderError>;

    /// Release the provider-side card resource.
    async fn release(&self, card: CardInput) -> Result<(), ProviderError>;
}
