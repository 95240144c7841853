use chrono::FixedOffset;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BOOKING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 30;
// UTC+10:00, the business's display timezone
const DEFAULT_BUSINESS_UTC_OFFSET_MINUTES: i32 = 600;
const DEFAULT_AUDIT_PATH: &str = "bookset-audit.json";

fn validate_gateway_environment(value: &str) -> Result<(), ValidationError> {
    if value == "sandbox" || value == "production" {
        Ok(())
    } else {
        let mut err = ValidationError::new("gateway_environment");
        err.message = Some("gateway_environment must be \"sandbox\" or \"production\"".into());
        Err(err)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Scheduling backend base URL (bookings + availability)
    #[validate(length(min = 1))]
    pub api_base_url: String,

    /// Payment backend base URL; falls back to `api_base_url` when unset
    #[serde(default)]
    pub payments_base_url: Option<String>,

    /// Card-SDK bridge base URL
    #[validate(length(min = 1))]
    pub gateway_base_url: String,

    /// Payment application id issued by the gateway
    #[validate(length(min = 1))]
    pub payment_application_id: String,

    /// Gateway location the deposits are charged against
    #[validate(length(min = 1))]
    pub payment_location_id: String,

    /// Gateway environment: "sandbox" or "production"
    #[serde(default = "default_gateway_environment")]
    #[validate(custom = "validate_gateway_environment")]
    pub gateway_environment: String,

    /// Booking-creation call timeout (seconds)
    #[serde(default = "default_booking_timeout_secs")]
    pub booking_timeout_secs: u64,

    /// Deposit-charge call timeout (seconds)
    #[serde(default = "default_payment_timeout_secs")]
    pub payment_timeout_secs: u64,

    /// Fixed business display offset from UTC, in minutes. Display only;
    /// never shifts availability date bucketing.
    #[serde(default = "default_business_utc_offset_minutes")]
    pub business_utc_offset_minutes: i32,

    /// Path of the local JSON audit file
    #[serde(default = "default_audit_path")]
    pub audit_path: String,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_gateway_environment() -> String {
    "sandbox".to_string()
}
fn default_booking_timeout_secs() -> u64 {
    DEFAULT_BOOKING_TIMEOUT_SECS
}
fn default_payment_timeout_secs() -> u64 {
    DEFAULT_PAYMENT_TIMEOUT_SECS
}
fn default_business_utc_offset_minutes() -> i32 {
    DEFAULT_BUSINESS_UTC_OFFSET_MINUTES
}
fn default_audit_path() -> String {
    DEFAULT_AUDIT_PATH.to_string()
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn payments_base_url(&self) -> &str {
        self.payments_base_url
            .as_deref()
            .unwrap_or(&self.api_base_url)
    }

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_secs(self.booking_timeout_secs)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    /// Offset used to render display times; clamped into the valid range.
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("UTC offset"))
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Load configuration from `config/default`, `config/<env>`, then
/// `APP__`-prefixed environment variables, in increasing precedence.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: the gateway credentials have no defaults - they MUST come from a
    // config file or environment variables, so a misconfigured deployment
    // fails at startup instead of at the first charge.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("api_base_url", "http://localhost:9090")?
        .set_default("gateway_base_url", "http://localhost:9091")?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    for required in ["payment_application_id", "payment_location_id"] {
        if config.get_string(required).is_err() {
            error!(
                "Missing required configuration '{}'; set APP__{} or add it to a config file",
                required,
                required.to_uppercase()
            );
            return Err(AppConfigError::Config(ConfigError::Message(format!(
                "missing required configuration '{required}'"
            ))));
        }
    }

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("bookset_api={level},tower_http=debug");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter =
        EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .ok();
    }
}
