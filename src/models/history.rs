use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the bot_history table. One row per (user_id, signal_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub signal_id: String,
    pub source_wallet: String,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub side: String,
    pub price: Decimal,
    pub requested_usd: Decimal,
    pub requested_shares: Decimal,
    pub status: String,
    pub reason: Option<String>,
    pub order_id: Option<String>,
    pub ts: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Signal event time (ms) as stored in the `ts` column. Out-of-range values clamp to the epoch.
    pub fn event_time(ts_ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ts_ms).unwrap_or_default()
    }

    pub fn status(&self) -> Option<HistoryStatus> {
        HistoryStatus::from_str(&self.status)
    }
}

/// Terminal status of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryStatus {
    Accepted,
    Filled,
    Rejected,
    Failed,
    Skipped,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Accepted => "ACCEPTED",
            HistoryStatus::Filled => "FILLED",
            HistoryStatus::Rejected => "REJECTED",
            HistoryStatus::Failed => "FAILED",
            HistoryStatus::Skipped => "SKIPPED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACCEPTED" => Some(HistoryStatus::Accepted),
            "FILLED" => Some(HistoryStatus::Filled),
            "REJECTED" => Some(HistoryStatus::Rejected),
            "FAILED" => Some(HistoryStatus::Failed),
            "SKIPPED" => Some(HistoryStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision-specific half of a history row; the rest comes from the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub requested_usd: Decimal,
    pub requested_shares: Decimal,
    pub status: HistoryStatus,
    pub reason: Option<&'static str>,
    pub order_id: Option<String>,
}

impl HistoryEntry {
    pub fn skipped(reason: &'static str, requested_usd: Decimal, requested_shares: Decimal) -> Self {
        Self {
            requested_usd,
            requested_shares,
            status: HistoryStatus::Skipped,
            reason: Some(reason),
            order_id: None,
        }
    }

    pub fn accepted(requested_usd: Decimal, requested_shares: Decimal, order_id: String) -> Self {
        Self {
            requested_usd,
            requested_shares,
            status: HistoryStatus::Accepted,
            reason: None,
            order_id: Some(order_id),
        }
    }

    pub fn failed(reason: &'static str, requested_usd: Decimal, requested_shares: Decimal) -> Self {
        Self {
            requested_usd,
            requested_shares,
            status: HistoryStatus::Failed,
            reason: Some(reason),
            order_id: None,
        }
    }
}
