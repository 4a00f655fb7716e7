use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{config_repo, credential_repo, history_repo, log_repo, state_repo};
use crate::execution::state::UserState;
use crate::models::{ActiveUser, BotLog, HistoryEntry, HistoryRecord, LogLevel, Signal};

use super::{BotStore, HistoryLedger};

/// Postgres-backed store; thin delegation to the repository functions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn enabled_users(&self) -> Result<Vec<ActiveUser>> {
        config_repo::get_enabled_users(&self.pool).await
    }

    async fn credential_blob(&self, user_id: &str) -> Result<Option<String>> {
        credential_repo::get_ciphertext(&self.pool, user_id).await
    }

    async fn append_log(
        &self,
        user_id: &str,
        level: LogLevel,
        message: &str,
        meta: serde_json::Value,
    ) -> Result<()> {
        log_repo::insert_log(&self.pool, user_id, level, message, &meta).await
    }

    async fn recent_logs(&self, user_id: &str, limit: i64) -> Result<Vec<BotLog>> {
        log_repo::get_recent_logs(&self.pool, user_id, limit).await
    }

    async fn load_user_state(&self, user_id: &str) -> Result<Option<UserState>> {
        state_repo::get_state(&self.pool, user_id).await
    }

    async fn save_user_state(&self, user_id: &str, state: &UserState) -> Result<()> {
        state_repo::upsert_state(&self.pool, user_id, state).await
    }
}

#[async_trait]
impl HistoryLedger for PgStore {
    async fn record(&self, user_id: &str, signal: &Signal, entry: &HistoryEntry) -> Result<bool> {
        history_repo::insert_history(&self.pool, user_id, signal, entry).await
    }

    async fn get(&self, user_id: &str, signal_id: &str) -> Result<Option<HistoryRecord>> {
        history_repo::get_history(&self.pool, user_id, signal_id).await
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>> {
        history_repo::get_recent_history(&self.pool, user_id, limit).await
    }
}
