use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookset API",
        version = "0.3.0",
        description = r#"
# Bookset Booking & Deposit API

Availability search plus the booking-payment flow for appointment businesses.

## Flow

1. `GET /api/v1/availability` — bookable times for a service, deduplicated per day
2. `POST /api/v1/bookings/quote` — deposit breakdown for the selected services
3. `POST /api/v1/bookings/confirm` — reserve the slot and charge the deposit

## Error Handling

Errors use a consistent envelope with appropriate HTTP status codes. When
`support_contact` is `true` the charge outcome is ambiguous: do **not**
retry, contact support with the `request_id`.

```json
{
  "error": "Payment Required",
  "message": "Payment processing failed: card declined",
  "support_contact": true,
  "request_id": "req-abc123xyz",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        contact(
            name = "Bookset Support",
            email = "support@bookset.io"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Availability", description = "Bookable-slot search"),
        (name = "Bookings", description = "Deposit quoting and booking confirmation"),
        (name = "Health", description = "Service health")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::availability::search_availability,
        crate::handlers::bookings::quote_deposit,
        crate::handlers::bookings::confirm_booking,
    ),
    components(schemas(
        crate::models::Service,
        crate::models::CustomerDetails,
        crate::models::BookingRecord,
        crate::models::PaymentRecord,
        crate::pricing::DepositQuote,
        crate::availability::AvailabilitySlot,
        crate::availability::StaffAvailability,
        crate::availability::AppointmentSegment,
        crate::availability::ResolvedSlot,
        crate::saga::CompletedBooking,
        crate::handlers::bookings::QuoteRequest,
        crate::handlers::bookings::ConfirmBookingRequest,
        crate::handlers::health::HealthResponse,
        crate::errors::ErrorResponse,
    ))
)]
pub struct ApiDoc;

/// Serve the OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
