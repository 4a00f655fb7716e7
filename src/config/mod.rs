use std::env;
use std::time::Duration;

use crate::credentials::MasterKey;
use crate::execution::{CopyEngineConfig, ExchangeBackend};
use crate::polymarket::clob_client::CLOB_API_BASE;
use crate::polymarket::data_client::DATA_API_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Read before the rest of the configuration so startup errors are logged in the right format.
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT").unwrap_or_default().trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Bearer token for `/api/*`. Unset disables auth (dev mode).
    pub api_token: Option<String>,

    // Signal feed
    pub signal_feed_url: String,
    pub signal_fetch_limit: u32,

    // Worker loop
    pub poll_interval_ms: u64,
    pub lookback_window_ms: i64,
    pub call_timeout_ms: u64,
    pub cycle_deadline_ms: u64,
    pub max_concurrent_users: usize,

    // Exchange
    pub exchange_backend: ExchangeBackend,
    pub clob_api_url: String,
    pub data_api_url: String,

    pub master_key: MasterKey,
}

impl AppConfig {
    /// Read configuration from the environment. Missing required values and an
    /// unusable master key are startup errors.
    pub fn from_env() -> anyhow::Result<Self> {
        let master_key_raw = required("CREDENTIALS_MASTER_KEY")?;
        let master_key = MasterKey::parse(&master_key_raw)
            .map_err(|e| anyhow::anyhow!("CREDENTIALS_MASTER_KEY: {e}"))?;

        let backend_raw = env::var("EXCHANGE_BACKEND").unwrap_or_else(|_| "paper".into());
        let exchange_backend = ExchangeBackend::from_str(&backend_raw)
            .ok_or_else(|| anyhow::anyhow!("EXCHANGE_BACKEND must be 'paper' or 'live', got '{backend_raw}'"))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),

            signal_feed_url: required("SIGNAL_FEED_URL")?,
            signal_fetch_limit: parse_or("SIGNAL_FETCH_LIMIT", 50),

            poll_interval_ms: parse_or("POLL_INTERVAL_MS", 1_500),
            lookback_window_ms: parse_or("LOOKBACK_WINDOW_MS", 60_000),
            call_timeout_ms: parse_or("CALL_TIMEOUT_MS", 10_000),
            cycle_deadline_ms: parse_or("CYCLE_DEADLINE_MS", 30_000),
            max_concurrent_users: parse_or::<usize>("MAX_CONCURRENT_USERS", 1).max(1),

            exchange_backend,
            clob_api_url: env::var("CLOB_API_URL").unwrap_or_else(|_| CLOB_API_BASE.into()),
            data_api_url: env::var("DATA_API_URL").unwrap_or_else(|_| DATA_API_BASE.into()),

            master_key,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn engine_config(&self) -> CopyEngineConfig {
        CopyEngineConfig {
            fetch_limit: self.signal_fetch_limit,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            cycle_deadline: Duration::from_millis(self.cycle_deadline_ms),
            max_concurrent_users: self.max_concurrent_users,
            lookback_window_ms: self.lookback_window_ms,
        }
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{name} must be set"))
}

/// Optional numeric setting; unparseable values fall back to the default.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Invalid numeric setting, using default");
            default
        }),
        Err(_) => default,
    }
}
