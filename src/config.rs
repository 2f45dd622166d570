use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_CART_SERVICE_URL: &str = "http://localhost:4001";
const DEFAULT_PAYMENT_SERVICE_URL: &str = "http://localhost:4002";
const DEFAULT_ORDER_SERVICE_URL: &str = "http://localhost:4003";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EVENT_BUFFER: usize = 1024;
const DEFAULT_FREE_SHIPPING_THRESHOLD: &str = "500";
const DEFAULT_FLAT_SHIPPING_FEE: &str = "50";

/// Application configuration with validation.
///
/// Layered from `config/default`, `config/{env}` and `CHECKOUT_*`
/// environment variables; every field has a usable development default so
/// the crate runs with no config directory at all.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the backing cart service
    #[validate(custom = "validate_base_url")]
    pub cart_service_url: String,

    /// Base URL of the payment gateway backend
    #[validate(custom = "validate_base_url")]
    pub payment_service_url: String,

    /// Base URL of the order service
    #[validate(custom = "validate_base_url")]
    pub order_service_url: String,

    /// Orders above this items subtotal ship free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat shipping fee charged below the threshold
    #[serde(default = "default_flat_shipping_fee")]
    pub flat_shipping_fee: Decimal,

    /// Timeout applied to every outbound HTTP call (seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Capacity of the event bus channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_free_shipping_threshold() -> Decimal {
    Decimal::from(500)
}

fn default_flat_shipping_fee() -> Decimal {
    Decimal::from(50)
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("base_url_scheme"))
    }
}

impl AppConfig {
    /// Construct a configuration programmatically (tests, embedding).
    pub fn new(
        cart_service_url: impl Into<String>,
        payment_service_url: impl Into<String>,
        order_service_url: impl Into<String>,
    ) -> Self {
        Self {
            cart_service_url: cart_service_url.into(),
            payment_service_url: payment_service_url.into(),
            order_service_url: order_service_url.into(),
            free_shipping_threshold: default_free_shipping_threshold(),
            flat_shipping_fee: default_flat_shipping_fee(),
            http_timeout_secs: default_http_timeout_secs(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            event_buffer: default_event_buffer(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (CHECKOUT_*)
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

    let config = Config::builder()
        .set_default("cart_service_url", DEFAULT_CART_SERVICE_URL)?
        .set_default("payment_service_url", DEFAULT_PAYMENT_SERVICE_URL)?
        .set_default("order_service_url", DEFAULT_ORDER_SERVICE_URL)?
        .set_default("free_shipping_threshold", DEFAULT_FREE_SHIPPING_THRESHOLD)?
        .set_default("flat_shipping_fee", DEFAULT_FLAT_SHIPPING_FEE)?
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("CHECKOUT").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        e
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the tracing subscriber honoring `RUST_LOG` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_checkout={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
