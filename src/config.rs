use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATABASE_URL: &str = "sqlite://stockcast.db?mode=rwc";
const CONFIG_DIR: &str = "config";
const DEFAULT_MODEL_VERSION: &str = "ma7-trend-weekday/1";

/// Tuning knobs for the demand model.
///
/// The defaults reproduce the published model exactly; overrides exist so a
/// deployment can widen the history window or re-weight the trend and weekday
/// components without a code change.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastTuning {
    /// How many trailing days of sales feed one forecast
    #[serde(default = "default_history_window_days")]
    #[validate(range(min = 1, max = 365))]
    pub history_window_days: u32,

    /// Minimum distinct sale days before a product is forecastable
    #[serde(default = "default_min_history_days")]
    #[validate(range(min = 1))]
    pub min_history_days: u32,

    /// Trailing days averaged for the baseline
    #[serde(default = "default_moving_average_window")]
    #[validate(range(min = 1, max = 60))]
    pub moving_average_window: u32,

    /// Weight of the half-over-half trend added to the baseline
    #[serde(default = "default_trend_weight")]
    #[validate(custom = "validate_unit_interval")]
    pub trend_weight: f64,

    /// Blend weight of the same-weekday average in the final prediction
    #[serde(default = "default_weekday_weight")]
    #[validate(custom = "validate_unit_interval")]
    pub weekday_weight: f64,

    /// Coefficient-of-variation scale mapping dispersion to confidence
    #[serde(default = "default_cv_scale")]
    #[validate(custom = "validate_positive")]
    pub cv_scale: f64,

    /// Stock below this fraction of predicted demand classifies as high priority
    #[serde(default = "default_high_priority_stock_ratio")]
    #[validate(custom = "validate_unit_interval")]
    pub high_priority_stock_ratio: f64,

    /// Version tag stamped onto every generated forecast row
    #[serde(default = "default_model_version")]
    #[validate(length(min = 1))]
    pub model_version: String,
}

impl Default for ForecastTuning {
    fn default() -> Self {
        Self {
            history_window_days: default_history_window_days(),
            min_history_days: default_min_history_days(),
            moving_average_window: default_moving_average_window(),
            trend_weight: default_trend_weight(),
            weekday_weight: default_weekday_weight(),
            cv_scale: default_cv_scale(),
            high_priority_stock_ratio: default_high_priority_stock_ratio(),
            model_version: default_model_version(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Demand model tuning
    #[serde(default)]
    pub forecast: ForecastTuning,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a configuration pointing at the given database with every
    /// other knob at its default. Used by tests and embedded callers.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: default_true_bool(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            forecast: ForecastTuning::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(nested) = self.forecast.validate() {
            for (field, field_errors) in nested.field_errors() {
                for err in field_errors {
                    errors.add(field, err.clone());
                }
            }
        }

        if self.forecast.min_history_days > self.forecast.history_window_days {
            let mut err = ValidationError::new("min_history_days");
            err.message = Some(
                "min_history_days cannot exceed history_window_days; no product could ever qualify"
                    .into(),
            );
            errors.add("min_history_days", err);
        }

        if self.forecast.moving_average_window > self.forecast.history_window_days {
            let mut err = ValidationError::new("moving_average_window");
            err.message =
                Some("moving_average_window cannot exceed history_window_days".into());
            errors.add("moving_average_window", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    5
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_history_window_days() -> u32 {
    30
}
fn default_min_history_days() -> u32 {
    7
}
fn default_moving_average_window() -> u32 {
    7
}
fn default_trend_weight() -> f64 {
    0.3
}
fn default_weekday_weight() -> f64 {
    0.3
}
fn default_cv_scale() -> f64 {
    0.5
}
fn default_high_priority_stock_ratio() -> f64 {
    0.3
}
fn default_model_version() -> String {
    DEFAULT_MODEL_VERSION.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_unit_interval(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 || value > 1.0 {
        let mut err = ValidationError::new("unit_interval");
        err.message = Some("Must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        let mut err = ValidationError::new("positive");
        err.message = Some("Must be a finite value greater than 0.0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("stockcast={}", level);
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

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
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
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
