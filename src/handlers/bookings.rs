use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::{CustomerDetails, Service};
use crate::pricing::{self, DepositQuote};
use crate::saga::{CompletedBooking, ConfirmBooking};
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "services": [{
        "id": "SVC-CUT-30",
        "name": "Haircut",
        "price": 4500,
        "duration_minutes": 30,
        "currency": "AUD"
    }]
}))]
pub struct QuoteRequest {
    /// Selected services, in selection order; must be non-empty
    #[validate]
    pub services: Vec<Service>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmBookingRequest {
    /// Selected services, in selection order; must be non-empty
    #[validate]
    pub services: Vec<Service>,
    /// Chosen slot start
    pub start_at: DateTime<Utc>,
    /// Staff member the slot belongs to
    #[validate(length(min = 1))]
    pub team_member_id: String,
    #[validate]
    pub customer: CustomerDetails,
    pub customer_note: Option<String>,
}

/// Quote the deposit for a selection
#[utoipa::path(
    post,
    path = "/api/v1/bookings/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Deposit breakdown", body = crate::ApiResponse<DepositQuote>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn quote_deposit(
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<DepositQuote>>, ServiceError> {
    request.validate()?;
    let quote = pricing::quote(&request.services)?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Confirm a booking and charge the deposit
///
/// Runs the booking-payment saga to a terminal state. Failures at or after
/// the charge step return `support_contact: true` in the error envelope;
/// those must not be retried by the customer.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/confirm",
    request_body = ConfirmBookingRequest,
    responses(
        (status = 201, description = "Booking created and deposit charged", body = crate::ApiResponse<CompletedBooking>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Deposit charge failed; contact support", body = crate::errors::ErrorResponse),
        (status = 409, description = "A confirmation is already in flight", body = crate::errors::ErrorResponse),
        (status = 502, description = "Booking backend rejected the request", body = crate::errors::ErrorResponse),
        (status = 504, description = "Booking backend timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CompletedBooking>>), ServiceError> {
    request.validate()?;

    let completed = state
        .orchestrator
        .confirm(ConfirmBooking {
            services: request.services,
            start_at: request.start_at,
            team_member_id: request.team_member_id,
            customer: request.customer,
            customer_note: request.customer_note,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(completed))))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/quote", post(quote_deposit))
        .route("/bookings/confirm", post(confirm_booking))
}
