use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// A normalized trade observed on a watched wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Stable dedup key, taken from the feed or derived from the trade fields.
    pub signal_id: String,
    pub source_wallet: String,
    pub market_id: String,
    /// Tradable instrument (CTF token id when the feed provides one).
    pub token_id: String,
    /// Outcome label as published; not restricted to Yes/No.
    pub outcome: String,
    pub side: Side,
    /// Unit price, 0..1 for probability markets.
    pub price: Decimal,
    pub notional_usd: Decimal,
    /// Event time in milliseconds since the Unix epoch.
    pub ts: i64,
}

impl Signal {
    /// Deterministic id for feeds that omit one, so a re-fetch yields the same key.
    pub fn derive_id(source_wallet: &str, market_id: &str, ts: i64, side: Side) -> String {
        format!("{source_wallet}-{market_id}-{ts}-{side}")
    }
}
