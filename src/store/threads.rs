use crate::types::OngoingThread;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Load a user's whole thread collection. Absent row means no threads yet.
pub(crate) async fn threads_for(
    pool: &SqlitePool,
    user_id: &str,
) -> anyhow::Result<Vec<OngoingThread>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT threads FROM ongoing_threads WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("query ongoing threads")?;

    let Some((raw,)) = row else {
        return Ok(Vec::new());
    };

    serde_json::from_str(&raw)
        .with_context(|| format!("invalid thread collection for user {user_id}"))
}

/// Replace a user's whole thread collection in one write.
pub(crate) async fn replace_threads(
    pool: &SqlitePool,
    user_id: &str,
    threads: &[OngoingThread],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(threads).context("encode thread collection")?;

    sqlx::query(
        "INSERT INTO ongoing_threads (user_id, threads, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
             threads = excluded.threads,
             updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(&raw)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await
    .context("replace thread collection")?;

    Ok(())
}
