use sqlx::PgPool;

/// The encrypted credential blob for a user, if one was uploaded.
pub async fn get_ciphertext(pool: &PgPool, user_id: &str) -> anyhow::Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT ciphertext FROM pm_credentials WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(ciphertext,)| ciphertext))
}

pub async fn upsert_ciphertext(pool: &PgPool, user_id: &str, ciphertext: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pm_credentials (user_id, ciphertext, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE SET ciphertext = $2, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(ciphertext)
    .execute(pool)
    .await?;

    Ok(())
}
