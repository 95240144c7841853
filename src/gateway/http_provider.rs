//! Production [`PaymentProvider`] backed by the card-SDK bridge service over
//! HTTP. The bridge hosts the actual card input; this client only drives it.

use super::{CardInput, PaymentProvider, ProviderError, TokenizeOutcome, VerificationDetails};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Clone)]
pub struct HttpPaymentProvider {
    http: reqwest::Client,
    base_url: String,
    application_id: String,
    location_id: String,
    environment: String,
}

#[derive(Debug, Serialize)]
struct CreateInstanceRequest<'a> {
    application_id: &'a str,
    location_id: &'a str,
    environment: &'a str,
}

#[derive(Debug, Deserialize)]
struct InstanceResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpPaymentProvider {
    pub fn new(
        base_url: impl Into<String>,
        application_id: impl Into<String>,
        location_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            application_id: application_id.into(),
            location_id: location_id.into(),
            environment: environment.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn rejected(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Rejected(format!("{status}: {body}"))
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn is_ready(&self) -> bool {
        match self.http.get(self.url("/card-sdk/health")).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HealthResponse>()
                .await
                .map(|h| h.status == "ready")
                .unwrap_or(false),
            Ok(response) => {
                debug!(status = %response.status(), "card sdk not ready");
                false
            }
            Err(err) => {
                debug!(%err, "card sdk health probe failed");
                false
            }
        }
    }

    async fn create_card_input(&self) -> Result<CardInput, ProviderError> {
        let response = self
            .http
            .post(self.url("/card-sdk/instances"))
            .json(&CreateInstanceRequest {
                application_id: &self.application_id,
                location_id: &self.location_id,
                environment: &self.environment,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        let instance: InstanceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(CardInput { id: instance.id })
    }

    async fn mount_ready(&self, mount_id: &str) -> bool {
        self.http
            .get(self.url(&format!("/card-sdk/mounts/{mount_id}")))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn attach(&self, card: &CardInput, mount_id: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.url(&format!("/card-sdk/instances/{}/attach", card.id)))
            .json(&json!({ "mount_id": mount_id }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejected(response).await)
        }
    }

    async fn tokenize(
        &self,
        card: &CardInput,
        verification: &VerificationDetails,
    ) -> Result<TokenizeOutcome, ProviderError> {
        let response = self
            .http
            .post(self.url(&format!("/card-sdk/instances/{}/tokenize", card.id)))
            .json(verification)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        response
            .json::<TokenizeOutcome>()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    async fn release(&self, card: CardInput) -> Result<(), ProviderError> {
        let response = self
            .http
            .delete(self.url(&format!("/card-sdk/instances/{}", card.id)))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejected(response).await)
        }
    }
}
