//! Bookset API Library
//!
//! Availability resolution and the booking-payment saga for appointment
//! businesses, over external scheduling and card-processing backends.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod audit;
pub mod availability;
pub mod clients;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod idempotency;
pub mod middleware_helpers;
pub mod models;
pub mod openapi;
pub mod pricing;
pub mod retry;
pub mod saga;
pub mod tracing;

use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub bookings_client: Arc<clients::BookingApiClient>,
    pub resolver: Arc<availability::AvailabilityResolver>,
    pub orchestrator: Arc<saga::BookingOrchestrator>,
    pub event_sender: events::EventSender,
}

/// The v1 API surface: availability search plus the booking flow.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::availability::routes())
        .merge(handlers::bookings::routes())
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            meta: Some(ResponseMeta::capture()),
        }
    }
}
