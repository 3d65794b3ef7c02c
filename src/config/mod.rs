use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    /// Absent when no payment gateway is set up
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Mysql,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mysql" => Ok(StoreBackend::Mysql),
            other => Err(AppError::Configuration(format!(
                "Invalid STORE_BACKEND '{}': expected memory or mysql",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required for the mysql backend
    pub database: Option<DatabaseConfig>,
    /// Upper bound on any single store call
    pub timeout_ms: u64,
    /// Conditional-write retries before `Conflict` is surfaced
    pub retry_limit: u32,
    pub numbering_retry_limit: u32,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub sweep_interval_secs: u64,
    /// Fail invoice creation instead of issuing provisional numbers
    pub strict_numbering: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub success_url: String,
    pub cancel_url: String,
    /// ISO 4217, lowercase
    pub currency: String,
    pub signature_tolerance_secs: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let backend: StoreBackend = var_or("STORE_BACKEND", "memory").parse()?;
        let database = match backend {
            StoreBackend::Mysql => Some(DatabaseConfig::from_env()?),
            StoreBackend::Memory => None,
        };

        let config = Config {
            app: AppConfig {
                env: var_or("APP_ENV", "development"),
                log_level: var_or("LOG_LEVEL", "info"),
                log_format: var_or("LOG_FORMAT", "pretty"),
            },
            server: ServerConfig::from_env()?,
            store: StoreConfig {
                backend,
                database,
                timeout_ms: parse_var("STORE_TIMEOUT_MS", "5000")?,
                retry_limit: parse_var("STORE_RETRY_LIMIT", "5")?,
                numbering_retry_limit: parse_var("NUMBERING_RETRY_LIMIT", "64")?,
            },
            ledger: LedgerConfig {
                sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "300")?,
                strict_numbering: parse_var("STRICT_NUMBERING", "false")?,
            },
            gateway: GatewayConfig::from_env()?,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.timeout_ms == 0 {
            return Err(AppError::Configuration(
                "Store timeout must be greater than 0".to_string(),
            ));
        }

        if self.store.retry_limit == 0 || self.store.numbering_retry_limit == 0 {
            return Err(AppError::Configuration(
                "Retry limits must be greater than 0".to_string(),
            ));
        }

        if self.ledger.sweep_interval_secs == 0 {
            return Err(AppError::Configuration(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Mysql && self.store.database.is_none() {
            return Err(AppError::Configuration(
                "DATABASE_URL is required for the mysql store backend".to_string(),
            ));
        }

        if let Some(gateway) = &self.gateway {
            if gateway.webhook_secret.is_empty() {
                return Err(AppError::Configuration(
                    "STRIPE_WEBHOOK_SECRET cannot be empty".to_string(),
                ));
            }
            if gateway.signature_tolerance_secs <= 0 {
                return Err(AppError::Configuration(
                    "Webhook signature tolerance must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl GatewayConfig {
    /// `None` unless `STRIPE_SECRET_KEY` is set
    pub fn from_env() -> Result<Option<Self>> {
        let secret_key = match env::var("STRIPE_SECRET_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => return Ok(None),
        };

        Ok(Some(GatewayConfig {
            secret_key,
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
                AppError::Configuration("STRIPE_WEBHOOK_SECRET not set".to_string())
            })?,
            base_url: var_or("STRIPE_BASE_URL", "https://api.stripe.com"),
            success_url: var_or("PAYMENT_SUCCESS_URL", "http://localhost:8080/paid"),
            cancel_url: var_or("PAYMENT_CANCEL_URL", "http://localhost:8080/canceled"),
            currency: var_or("INVOICE_CURRENCY", "usd").to_lowercase(),
            signature_tolerance_secs: parse_var("STRIPE_SIGNATURE_TOLERANCE_SECS", "300")?,
        }))
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T> {
    var_or(key, default)
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", key)))
}
