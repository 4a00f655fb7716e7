pub mod bot_config;
pub mod history;
pub mod log;
pub mod signal;

pub use bot_config::{ActiveUser, BotConfig, BotConfigRow};
pub use history::{HistoryEntry, HistoryRecord, HistoryStatus};
pub use log::{BotLog, LogLevel};
pub use signal::Signal;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Feed sides default to BUY; only an explicit SELL flips it.
    pub fn from_feed_str(s: Option<&str>) -> Self {
        match s {
            Some(v) if v.trim().eq_ignore_ascii_case("SELL") => Side::Sell,
            _ => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
