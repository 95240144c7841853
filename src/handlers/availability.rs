use crate::availability::ResolvedSlot;
use crate::clients::AvailabilityQuery;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::ApiResponse;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilitySearchParams {
    /// First day of the queried range (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the queried range (inclusive)
    pub end_date: NaiveDate,
    /// Service the customer is booking
    pub service_id: String,
    /// Comma-separated staff ids to query
    pub team_member_ids: String,
}

/// Search bookable times for a service
///
/// Fetches per-staff open-slot feeds from the scheduling backend and returns
/// the deduplicated, date-keyed calendar index.
#[utoipa::path(
    get,
    path = "/api/v1/availability",
    params(AvailabilitySearchParams),
    responses(
        (status = 200, description = "Date-keyed slot index", body = crate::ApiResponse<BTreeMap<String, Vec<ResolvedSlot>>>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Scheduling backend unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Availability"
)]
pub async fn search_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilitySearchParams>,
) -> Result<Json<ApiResponse<BTreeMap<String, Vec<ResolvedSlot>>>>, ServiceError> {
    if params.end_date < params.start_date {
        return Err(ServiceError::ValidationError(
            "end_date must not precede start_date".into(),
        ));
    }
    let team_member_ids: Vec<String> = params
        .team_member_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if team_member_ids.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one team member id is required".into(),
        ));
    }

    let query = AvailabilityQuery {
        start_date: params.start_date,
        end_date: params.end_date,
        service_id: params.service_id.clone(),
        team_member_ids,
        timezone: state.config.display_offset().to_string(),
    };

    let feeds = state.bookings_client.search_availability(&query).await?;
    let index = state.resolver.resolve(&params.service_id, &feeds);

    let by_date: BTreeMap<String, Vec<ResolvedSlot>> = index
        .into_iter()
        .map(|(date, slots)| (date.to_string(), slots))
        .collect();

    Ok(Json(ApiResponse::success(by_date)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/availability", get(search_availability))
}
