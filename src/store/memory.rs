use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::execution::state::UserState;
use crate::models::{ActiveUser, BotLog, HistoryEntry, HistoryRecord, LogLevel, Signal};

use super::{BotStore, HistoryLedger};

/// In-process store with the same semantics as [`super::PgStore`].
/// Backs tests and local runs without a database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: Vec<(ActiveUser, bool)>,
    credentials: HashMap<String, String>,
    history: Vec<HistoryRecord>,
    logs: Vec<BotLog>,
    states: HashMap<String, UserState>,
    ledger_unavailable: bool,
    user_load_failures: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user's configuration.
    pub async fn upsert_user(&self, user: ActiveUser, enabled: bool) {
        let mut inner = self.inner.write().await;
        match inner.users.iter_mut().find(|(u, _)| u.user_id == user.user_id) {
            Some(slot) => *slot = (user, enabled),
            None => inner.users.push((user, enabled)),
        }
    }

    pub async fn set_credential_blob(&self, user_id: &str, blob: &str) {
        self.inner
            .write()
            .await
            .credentials
            .insert(user_id.to_string(), blob.to_string());
    }

    /// Make every ledger call fail until switched back.
    pub async fn set_ledger_unavailable(&self, unavailable: bool) {
        self.inner.write().await.ledger_unavailable = unavailable;
    }

    /// Fail the next `count` calls to list enabled users.
    pub async fn fail_user_loads(&self, count: usize) {
        self.inner.write().await.user_load_failures = count;
    }

    pub async fn pending_user_load_failures(&self) -> usize {
        self.inner.read().await.user_load_failures
    }

    /// Every log line for `user_id`, oldest first.
    pub async fn logs_for(&self, user_id: &str) -> Vec<BotLog> {
        self.inner
            .read()
            .await
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every history row for `user_id`, in insertion order.
    pub async fn history_for(&self, user_id: &str) -> Vec<HistoryRecord> {
        self.inner
            .read()
            .await
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn cached_state(&self, user_id: &str) -> Option<UserState> {
        self.inner.read().await.states.get(user_id).cloned()
    }
}

#[async_trait]
impl BotStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn enabled_users(&self) -> Result<Vec<ActiveUser>> {
        let mut inner = self.inner.write().await;
        if inner.user_load_failures > 0 {
            inner.user_load_failures -= 1;
            bail!("user configuration unavailable");
        }
        let mut users: Vec<ActiveUser> = inner
            .users
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(u, _)| u.clone())
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn credential_blob(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.credentials.get(user_id).cloned())
    }

    async fn append_log(
        &self,
        user_id: &str,
        level: LogLevel,
        message: &str,
        meta: serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let id = inner.logs.len() as i64 + 1;
        inner.logs.push(BotLog {
            id,
            user_id: user_id.to_string(),
            level: level.as_str().to_string(),
            message: message.to_string(),
            meta,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_logs(&self, user_id: &str, limit: i64) -> Result<Vec<BotLog>> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn load_user_state(&self, user_id: &str) -> Result<Option<UserState>> {
        Ok(self.inner.read().await.states.get(user_id).cloned())
    }

    async fn save_user_state(&self, user_id: &str, state: &UserState) -> Result<()> {
        let mut inner = self.inner.write().await;
        let cached = inner
            .states
            .entry(user_id.to_string())
            .or_insert_with(|| UserState::new(state.last_signal_ts));
        cached.advance_to(state.last_signal_ts);
        for (token, ts) in &state.last_trade_by_token {
            cached.record_trade_at(token, *ts);
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for MemoryStore {
    async fn record(&self, user_id: &str, signal: &Signal, entry: &HistoryEntry) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.ledger_unavailable {
            bail!("history ledger unavailable");
        }

        let exists = inner
            .history
            .iter()
            .any(|h| h.user_id == user_id && h.signal_id == signal.signal_id);
        if exists {
            return Ok(false);
        }

        inner.history.push(HistoryRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            signal_id: signal.signal_id.clone(),
            source_wallet: signal.source_wallet.clone(),
            market_id: signal.market_id.clone(),
            token_id: signal.token_id.clone(),
            outcome: signal.outcome.clone(),
            side: signal.side.as_str().to_string(),
            price: signal.price,
            requested_usd: entry.requested_usd,
            requested_shares: entry.requested_shares,
            status: entry.status.as_str().to_string(),
            reason: entry.reason.map(str::to_string),
            order_id: entry.order_id.clone(),
            ts: HistoryRecord::event_time(signal.ts),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn get(&self, user_id: &str, signal_id: &str) -> Result<Option<HistoryRecord>> {
        let inner = self.inner.read().await;
        if inner.ledger_unavailable {
            bail!("history ledger unavailable");
        }
        Ok(inner
            .history
            .iter()
            .find(|h| h.user_id == user_id && h.signal_id == signal_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
