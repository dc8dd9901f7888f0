use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_REFETCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_OCCUPANCY_POLL_SECS: u64 = 60;
const DEFAULT_REMINDER_LEAD_MINS: i64 = 15;
const DEFAULT_CHANGE_FEED_CAPACITY: usize = 1024;
const DEFAULT_INSTITUTIONAL_DOMAIN: &str = "campus.edu";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// HS256 secret shared with the identity provider that issues tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Quiet period collapsing bursts of room refetch requests
    #[serde(default = "default_refetch_debounce_ms")]
    #[validate(range(min = 1))]
    pub refetch_debounce_ms: u64,

    /// Occupancy re-derivation interval
    #[serde(default = "default_occupancy_poll_secs")]
    #[validate(range(min = 1))]
    pub occupancy_poll_secs: u64,

    /// How long before a reservation starts its reminder fires
    #[serde(default = "default_reminder_lead_mins")]
    #[validate(range(min = 1))]
    pub reminder_lead_mins: i64,

    /// Email domain of protected institutional (Google) accounts
    #[serde(default = "default_institutional_domain")]
    pub institutional_domain: String,

    /// Buffered change notifications per subscriber
    #[serde(default = "default_change_feed_capacity")]
    #[validate(range(min = 1))]
    pub change_feed_capacity: usize,
}

impl AppConfig {
    /// Creates a new configuration with defaults for every tunable
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            jwt_secret,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            refetch_debounce_ms: default_refetch_debounce_ms(),
            occupancy_poll_secs: default_occupancy_poll_secs(),
            reminder_lead_mins: default_reminder_lead_mins(),
            institutional_domain: default_institutional_domain(),
            change_feed_capacity: default_change_feed_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn refetch_debounce(&self) -> Duration {
        Duration::from_millis(self.refetch_debounce_ms)
    }

    pub fn occupancy_poll_interval(&self) -> Duration {
        Duration::from_secs(self.occupancy_poll_secs)
    }

    pub fn reminder_lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reminder_lead_mins)
    }

    /// Allowed CORS origins, empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.cors_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins");
            err.message = Some("production requires explicit CORS origins".into());
            errors.add("cors_allowed_origins", err);
        }

        if self.institutional_domain.trim().is_empty() || self.institutional_domain.contains('@')
        {
            let mut err = ValidationError::new("institutional_domain");
            err.message = Some("institutional_domain must be a bare domain like campus.edu".into());
            errors.add("institutional_domain", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}

fn default_refetch_debounce_ms() -> u64 {
    DEFAULT_REFETCH_DEBOUNCE_MS
}

fn default_occupancy_poll_secs() -> u64 {
    DEFAULT_OCCUPANCY_POLL_SECS
}

fn default_reminder_lead_mins() -> i64 {
    DEFAULT_REMINDER_LEAD_MINS
}

fn default_institutional_domain() -> String {
    DEFAULT_INSTITUTIONAL_DOMAIN.to_string()
}

fn default_change_feed_capacity() -> usize {
    DEFAULT_CHANGE_FEED_CAPACITY
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

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("campusdesk_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
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
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let dir = config_dir.display();
    let config = Config::builder()
        .set_default("database_url", "sqlite://campusdesk.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no default; fail with a pointed message instead of a serde one
    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to the identity provider's signing secret.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_development_secret_that_is_long_enough_0123456789".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_match_documented_intervals() {
        let cfg = base_config();
        assert_eq!(cfg.refetch_debounce(), Duration::from_millis(300));
        assert_eq!(cfg.occupancy_poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.reminder_lead(), chrono::Duration::minutes(15));
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_requires_cors_origins() {
        let mut cfg = base_config();
        cfg.environment = "production".into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.cors_allowed_origins = Some("https://rooms.campus.edu, ".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.cors_origins(), vec!["https://rooms.campus.edu".to_string()]);
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let mut cfg = base_config();
        cfg.refetch_debounce_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_email_as_institutional_domain() {
        let mut cfg = base_config();
        cfg.institutional_domain = "admin@campus.edu".into();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn loads_layered_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
                jwt_secret = "file_secret_that_is_definitely_long_enough_42"
                refetch_debounce_ms = 500
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            r#"
                port = 9090
                institutional_domain = "uni.example"
            "#,
        )
        .unwrap();

        let cfg = load_config_from(dir.path(), "staging").unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.refetch_debounce_ms, 500);
        assert_eq!(cfg.institutional_domain, "uni.example");
        assert_eq!(cfg.environment, "staging");
    }
}
