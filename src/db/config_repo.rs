use sqlx::PgPool;

use crate::models::{ActiveUser, BotConfigRow};

/// All users whose bot is switched on, with their sizing configuration.
pub async fn get_enabled_users(pool: &PgPool) -> anyhow::Result<Vec<ActiveUser>> {
    let rows = sqlx::query_as::<_, BotConfigRow>(
        r#"
        SELECT user_id, enabled, targets, multiplier, max_trade_usd, min_notional_usd,
               max_slippage_bps, copy_delay_ms
        FROM bot_config
        WHERE enabled = TRUE
        ORDER BY user_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(BotConfigRow::into_active_user).collect())
}

/// Insert or replace one user's configuration. Used by seeding tools and tests;
/// the worker itself never writes configuration.
pub async fn upsert_config(pool: &PgPool, row: &BotConfigRow) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bot_config (user_id, enabled, targets, multiplier, max_trade_usd,
                                min_notional_usd, max_slippage_bps, copy_delay_ms, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            enabled = $2, targets = $3, multiplier = $4, max_trade_usd = $5,
            min_notional_usd = $6, max_slippage_bps = $7, copy_delay_ms = $8, updated_at = NOW()
        "#,
    )
    .bind(&row.user_id)
    .bind(row.enabled)
    .bind(&row.targets)
    .bind(row.multiplier)
    .bind(row.max_trade_usd)
    .bind(row.min_notional_usd)
    .bind(row.max_slippage_bps)
    .bind(row.copy_delay_ms)
    .execute(pool)
    .await?;

    Ok(())
}
