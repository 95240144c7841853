//! Shared domain types exchanged with the scheduling and payment backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

/// Durations at or above this value cannot plausibly be minutes; some backend
/// paths report milliseconds instead and those are converted on read.
pub const DURATION_MS_THRESHOLD: i64 = 10_000;

/// Normalize a raw duration that may arrive in minutes or milliseconds.
pub fn normalize_duration_minutes(raw: i64) -> i64 {
    if raw >= DURATION_MS_THRESHOLD {
        raw / 60_000
    } else {
        raw
    }
}

/// A bookable service as fetched from the catalog. Immutable for the
/// lifetime of a booking session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "id": "SVC-CUT-30",
    "name": "Haircut",
    "price": 4500,
    "duration_minutes": 30,
    "currency": "AUD"
}))]
pub struct Service {
    /// Catalog identifier
    #[validate(length(min = 1))]
    pub id: String,
    pub name: String,
    /// Price in minor units (cents)
    #[validate(range(min = 0))]
    pub price: i64,
    /// Duration as reported by the backend; may be minutes or milliseconds
    #[validate(range(min = 1))]
    pub duration_minutes: i64,
    /// ISO 4217 code
    #[validate(length(equal = 3))]
    pub currency: String,
}

impl Service {
    /// Duration in minutes regardless of which unit the backend used.
    pub fn duration_mins(&self) -> i64 {
        normalize_duration_minutes(self.duration_minutes)
    }
}

/// The payer: billing contact for tokenization and the customer attached to
/// the booking. `id` is the pre-booking identifier and may be superseded by
/// the identifier the booking backend returns.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub given_name: String,
    #[validate(length(min = 1))]
    pub family_name: String,
    #[validate(email)]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Booking as echoed by the scheduling backend after creation. The
/// `customer_id` here is authoritative: the backend may have just-in-time
/// created or linked the payer identity during booking creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingRecord {
    pub id: String,
    pub customer_id: String,
    pub start_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub version: i64,
}

/// A completed deposit charge as issued by the payment backend.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    pub id: String,
    /// Charged amount in minor units
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}
