use sqlx::PgPool;

use crate::models::{HistoryEntry, HistoryRecord, Signal};

/// Record a decision for (user, signal). The first write wins: a second call for
/// the same key changes nothing and returns `false`.
pub async fn insert_history(
    pool: &PgPool,
    user_id: &str,
    signal: &Signal,
    entry: &HistoryEntry,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO bot_history (user_id, signal_id, source_wallet, market_id, token_id, outcome,
                                 side, price, requested_usd, requested_shares, status, reason,
                                 order_id, ts)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (user_id, signal_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&signal.signal_id)
    .bind(&signal.source_wallet)
    .bind(&signal.market_id)
    .bind(&signal.token_id)
    .bind(&signal.outcome)
    .bind(signal.side.as_str())
    .bind(signal.price)
    .bind(entry.requested_usd)
    .bind(entry.requested_shares)
    .bind(entry.status.as_str())
    .bind(entry.reason)
    .bind(entry.order_id.as_deref())
    .bind(HistoryRecord::event_time(signal.ts))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_history(
    pool: &PgPool,
    user_id: &str,
    signal_id: &str,
) -> anyhow::Result<Option<HistoryRecord>> {
    let record = sqlx::query_as::<_, HistoryRecord>(
        "SELECT * FROM bot_history WHERE user_id = $1 AND signal_id = $2",
    )
    .bind(user_id)
    .bind(signal_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Most recent decisions for a user, newest first.
pub async fn get_recent_history(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<HistoryRecord>> {
    let records = sqlx::query_as::<_, HistoryRecord>(
        "SELECT * FROM bot_history WHERE user_id = $1 ORDER BY created_at DESC, ts DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}
