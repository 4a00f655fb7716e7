use sqlx::PgPool;

use crate::models::{BotLog, LogLevel};

pub async fn insert_log(
    pool: &PgPool,
    user_id: &str,
    level: LogLevel,
    message: &str,
    meta: &serde_json::Value,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO bot_logs (user_id, level, message, meta) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(level.as_str())
        .bind(message)
        .bind(meta)
        .execute(pool)
        .await?;

    Ok(())
}

/// Newest first.
pub async fn get_recent_logs(pool: &PgPool, user_id: &str, limit: i64) -> anyhow::Result<Vec<BotLog>> {
    let logs = sqlx::query_as::<_, BotLog>(
        "SELECT * FROM bot_logs WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}
