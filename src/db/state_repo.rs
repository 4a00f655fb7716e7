use std::collections::HashMap;

use sqlx::PgPool;

use crate::execution::state::UserState;

#[derive(Debug, sqlx::FromRow)]
struct UserStateRow {
    last_signal_ts: i64,
    last_trade_by_token: serde_json::Value,
}

/// Cached watermark and cooldowns for a user. A malformed cooldown map loads as empty.
pub async fn get_state(pool: &PgPool, user_id: &str) -> anyhow::Result<Option<UserState>> {
    let row = sqlx::query_as::<_, UserStateRow>(
        "SELECT last_signal_ts, last_trade_by_token FROM bot_state WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let last_trade_by_token: HashMap<String, i64> =
            serde_json::from_value(r.last_trade_by_token).unwrap_or_default();
        UserState {
            last_signal_ts: r.last_signal_ts,
            last_trade_by_token,
        }
    }))
}

/// Upsert the cache. The watermark and each token's cooldown stamp keep the
/// larger of the stored and incoming values, so a stale writer cannot rewind them.
pub async fn upsert_state(pool: &PgPool, user_id: &str, state: &UserState) -> anyhow::Result<()> {
    let cooldowns = serde_json::to_value(&state.last_trade_by_token)?;

    sqlx::query(
        r#"
        INSERT INTO bot_state (user_id, last_signal_ts, last_trade_by_token, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            last_signal_ts = GREATEST(bot_state.last_signal_ts, $2),
            last_trade_by_token = (
                SELECT COALESCE(
                    jsonb_object_agg(
                        key,
                        GREATEST(
                            COALESCE((bot_state.last_trade_by_token ->> key)::bigint, 0),
                            COALESCE(($3::jsonb ->> key)::bigint, 0)
                        )
                    ),
                    '{}'::jsonb
                )
                FROM jsonb_object_keys(bot_state.last_trade_by_token || $3::jsonb) AS key
            ),
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(state.last_signal_ts)
    .bind(cooldowns)
    .execute(pool)
    .await?;

    Ok(())
}
