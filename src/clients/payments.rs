//! Client for the payment backend's charge endpoint.

use crate::errors::ServiceError;
use crate::models::PaymentRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct PaymentsApiClient {
    http: reqwest::Client,
    base_url: String,
}

/// Body for `POST /payments/process`. The customer id must be the one echoed
/// by booking creation, which may have just-in-time linked a payer identity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest<'a> {
    /// Single-use charge token from tokenization
    pub source_id: &'a str,
    /// Minor units
    pub amount: i64,
    pub currency: &'a str,
    pub idempotency_key: &'a str,
    pub location_id: &'a str,
    pub customer_details: PaymentCustomer<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCustomer<'a> {
    pub id: &'a str,
    pub email_address: &'a str,
    pub given_name: &'a str,
    pub family_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProcessPaymentResponse {
    payment: PaymentRecord,
}

impl PaymentsApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Charge the deposit. Every failure here is ambiguous — the gateway may
    /// have charged and lost the response — so callers must treat it as a
    /// possible charge-without-confirmation, never as safely retryable.
    #[instrument(skip(self, request), fields(idempotency_key = %request.idempotency_key, amount = request.amount))]
    pub async fn process_payment(
        &self,
        request: &ProcessPaymentRequest<'_>,
    ) -> Result<PaymentRecord, ServiceError> {
        let url = format!("{}/payments/process", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentProcessingFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "payment processing rejected");
            return Err(ServiceError::PaymentProcessingFailed(format!(
                "{status}: {body}"
            )));
        }

        let body: ProcessPaymentResponse = response.json().await.map_err(|e| {
            ServiceError::PaymentProcessingFailed(format!("unreadable response: {e}"))
        })?;
        Ok(body.payment)
    }
}
