use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use clap::Parser;
use tokio::{signal, sync::mpsc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use bookset_api as api;

#[derive(Parser)]
#[command(name = "bookset-api", version, about = "Booking and deposit engine")]
struct Cli {
    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut cfg = api::config::load_config()?;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // External collaborators
    let bookings_client = Arc::new(api::clients::BookingApiClient::new(
        cfg.api_base_url.clone(),
        cfg.booking_timeout(),
    )?);
    let payments_client = Arc::new(api::clients::PaymentsApiClient::new(
        cfg.payments_base_url().to_string(),
        cfg.payment_timeout(),
    )?);

    // Payment gateway: bootstrap runs in the background so a slow SDK bridge
    // doesn't block startup; confirmations fail cleanly until it is ready.
    let provider = Arc::new(api::gateway::HttpPaymentProvider::new(
        cfg.gateway_base_url.clone(),
        cfg.payment_application_id.clone(),
        cfg.payment_location_id.clone(),
        cfg.gateway_environment.clone(),
    )?);
    let gateway = Arc::new(api::gateway::PaymentGatewayAdapter::new(
        provider,
        api::gateway::GatewayTuning::default(),
    ));
    {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            if let Err(err) = gateway
                .initialize(api::gateway::adapter::DEFAULT_CARD_MOUNT)
                .await
            {
                error!("payment gateway bootstrap failed: {}", err);
            }
        });
    }

    let audit: Arc<dyn api::audit::AuditStore> =
        Arc::new(api::audit::FileAuditStore::new(cfg.audit_path.clone()));
    let resolver = Arc::new(api::availability::AvailabilityResolver::new(
        cfg.payment_location_id.clone(),
        cfg.display_offset(),
    ));
    let orchestrator = Arc::new(api::saga::BookingOrchestrator::new(
        gateway.clone(),
        bookings_client.clone(),
        payments_client,
        audit,
        event_sender.clone(),
        cfg.payment_location_id.clone(),
    ));

    let app_state = api::AppState {
        config: cfg.clone(),
        bookings_client,
        resolver,
        orchestrator,
        event_sender,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
                .into(),
        );
    };

    let app = Router::new()
        .route("/", get(|| async { "bookset-api up" }))
        .route("/health", get(api::handlers::health::health))
        .route(
            "/api-docs/openapi.json",
            get(api::openapi::openapi_json),
        )
        .nest("/api/v1", api::api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(api::tracing::configure_http_tracing())
        .layer(cors_layer)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            api::middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("bookset-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the gateway-side card resource on the way out; safe if the
    // bootstrap never finished.
    gateway.release().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
