//! Client for the scheduling backend: booking creation and availability
//! search.

use crate::availability::{AppointmentSegment, StaffAvailability};
use crate::errors::ServiceError;
use crate::models::{BookingRecord, CustomerDetails};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct BookingApiClient {
    http: reqwest::Client,
    base_url: String,
    booking_timeout: Duration,
}

/// Body for `POST /bookings/self-managed/segments`. The booking is created
/// unpaid; payment is attached by a later saga step.
#[derive(Debug, Serialize)]
pub struct CreateBookingRequest<'a> {
    pub start_at: DateTime<Utc>,
    pub appointment_segments: &'a [AppointmentSegment],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<&'a str>,
    pub customer: &'a CustomerDetails,
    #[serde(rename = "idempotencyKey")]
    pub idempotency_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateBookingResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    booking: Option<BookingRecord>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub service_id: String,
    pub team_member_ids: Vec<String>,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
struct SearchAvailabilityResponse {
    #[serde(default)]
    availabilities: Vec<StaffAvailability>,
}

impl BookingApiClient {
    pub fn new(base_url: impl Into<String>, booking_timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            booking_timeout,
        })
    }

    /// Create an unpaid booking. Success requires the backend to echo an
    /// explicit `success: true` with a booking object; a bare 2xx or an
    /// ambiguous body is treated as failure.
    #[instrument(skip(self, request), fields(idempotency_key = %request.idempotency_key))]
    pub async fn create_booking(
        &self,
        request: &CreateBookingRequest<'_>,
    ) -> Result<BookingRecord, ServiceError> {
        let url = format!("{}/bookings/self-managed/segments", self.base_url);

        let response = self
            .http
            .post(&url)
            .timeout(self.booking_timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ServiceError::BookingCreationTimeout
                } else {
                    ServiceError::BookingCreationFailed(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "booking creation rejected");
            return Err(ServiceError::BookingCreationFailed(format!(
                "{status}: {body}"
            )));
        }

        let body: CreateBookingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::BookingCreationFailed(format!("unreadable response: {e}")))?;

        match (body.success, body.booking) {
            (Some(true), Some(booking)) => Ok(booking),
            _ => Err(ServiceError::BookingCreationFailed(
                body.message
                    .unwrap_or_else(|| "backend did not confirm success".into()),
            )),
        }
    }

    /// Fetch per-staff open-slot feeds for a date range.
    #[instrument(skip(self))]
    pub async fn search_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Vec<StaffAvailability>, ServiceError> {
        let url = format!("{}/availability/search", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("start_date", query.start_date.to_string()),
                ("end_date", query.end_date.to_string()),
                ("service_id", query.service_id.clone()),
                ("team_member_ids", query.team_member_ids.join(",")),
                ("timezone", query.timezone.clone()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "availability search failed: {status}: {body}"
            )));
        }

        let body: SearchAvailabilityResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Ok(body.availabilities)
    }
}
