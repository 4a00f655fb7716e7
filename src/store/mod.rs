//! Storage seams used by the worker and the reporting API.
//!
//! [`BotStore`] covers configuration, credentials, the per-user log stream and
//! the state cache; [`HistoryLedger`] is the idempotent decision record. Both
//! have a Postgres implementation ([`PgStore`]) and an in-memory one
//! ([`MemoryStore`]).

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::execution::state::UserState;
use crate::models::{ActiveUser, BotLog, HistoryEntry, HistoryRecord, LogLevel, Signal};

#[async_trait]
pub trait BotStore: Send + Sync {
    /// Cheap connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;

    async fn enabled_users(&self) -> Result<Vec<ActiveUser>>;

    /// Encrypted credential blob, `None` if the user never uploaded one.
    async fn credential_blob(&self, user_id: &str) -> Result<Option<String>>;

    async fn append_log(
        &self,
        user_id: &str,
        level: LogLevel,
        message: &str,
        meta: serde_json::Value,
    ) -> Result<()>;

    async fn recent_logs(&self, user_id: &str, limit: i64) -> Result<Vec<BotLog>>;

    async fn load_user_state(&self, user_id: &str) -> Result<Option<UserState>>;

    async fn save_user_state(&self, user_id: &str, state: &UserState) -> Result<()>;
}

#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// Record a decision keyed by `(user_id, signal.signal_id)`.
    /// Returns `false` when the key already existed; the stored row is left untouched.
    async fn record(&self, user_id: &str, signal: &Signal, entry: &HistoryEntry) -> Result<bool>;

    async fn get(&self, user_id: &str, signal_id: &str) -> Result<Option<HistoryRecord>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>>;
}
