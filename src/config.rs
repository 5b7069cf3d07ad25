use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

const CONFIG_DIR: &str = "config";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_JWT_ISSUER: &str = "musclezone-api";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 72;

/// Application configuration, loaded from `config/` files and `APP__*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (postgres or sqlite).
    #[validate(length(min = 1, message = "database_url is required"))]
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    #[validate(length(min = 16, message = "jwt_secret must be at least 16 characters"))]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Flat shipping fee added to every order total.
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: Decimal,

    /// Whether to run database migrations on startup.
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,

    /// Comma-separated list of allowed CORS origins; permissive when unset.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_jwt_issuer() -> String {
    DEFAULT_JWT_ISSUER.to_string()
}

fn default_token_ttl_hours() -> i64 {
    DEFAULT_TOKEN_TTL_HOURS
}

fn default_shipping_fee() -> Decimal {
    Decimal::from(100)
}

fn default_auto_migrate() -> bool {
    true
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration: `config/default`, then `config/{environment}`,
/// then `APP__*` environment variables, later sources winning.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment =
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    info!(
        environment = %app_config.environment,
        port = app_config.port,
        "configuration loaded"
    );
    Ok(app_config)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let json = serde_json::json!({
            "database_url": "sqlite::memory:",
            "jwt_secret": "unit-test-secret",
        });
        let config: AppConfig = serde_json::from_value(json).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.shipping_fee, Decimal::from(100));
        assert_eq!(config.jwt_issuer, DEFAULT_JWT_ISSUER);
        assert!(config.auto_migrate);
        assert!(config.is_development());
    }
}
