use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user sizing and risk parameters. Read-only to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Watched wallet addresses.
    pub targets: Vec<String>,
    /// Fraction (0..1) of the observed notional to mirror.
    pub multiplier: Decimal,
    pub max_trade_usd: Decimal,
    pub min_notional_usd: Decimal,
    pub max_slippage_bps: i64,
    /// Per-token cooldown between two copied trades.
    pub copy_delay_ms: i64,
}

/// Database row for the bot_config table.
#[derive(Debug, Clone, FromRow)]
pub struct BotConfigRow {
    pub user_id: String,
    pub enabled: bool,
    pub targets: serde_json::Value,
    pub multiplier: Decimal,
    pub max_trade_usd: Decimal,
    pub min_notional_usd: Decimal,
    pub max_slippage_bps: i32,
    pub copy_delay_ms: i32,
}

impl BotConfigRow {
    /// Non-string entries in `targets` are dropped rather than failing the row.
    pub fn into_active_user(self) -> ActiveUser {
        let targets = match self.targets {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        ActiveUser {
            user_id: self.user_id,
            config: BotConfig {
                targets,
                multiplier: self.multiplier,
                max_trade_usd: self.max_trade_usd,
                min_notional_usd: self.min_notional_usd,
                max_slippage_bps: i64::from(self.max_slippage_bps),
                copy_delay_ms: i64::from(self.copy_delay_ms),
            },
        }
    }
}

/// An enabled user together with their configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUser {
    pub user_id: String,
    pub config: BotConfig,
}
