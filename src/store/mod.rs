pub(crate) mod open_loops;
pub(crate) mod promises;
mod schema;
pub(crate) mod threads;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
#[cfg(test)]
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

/// SQLite-backed persistence for open loops, promises, and ongoing threads.
///
/// All tables are per-user partitioned by a `user_id` column; timestamps are
/// RFC3339 text. Row-level helpers live in the submodules and return
/// `anyhow::Result` — the component layer above converts failures into the
/// sentinel values sweeps expect.
pub struct EngagementStore {
    pool: SqlitePool,
}

impl EngagementStore {
    /// Open (or create) the database at `<workspace_dir>/engagement/engagement.db`.
    pub async fn new(workspace_dir: &Path) -> anyhow::Result<Self> {
        let db_path = workspace_dir.join("engagement").join("engagement.db");

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("create engagement directory")?;
        }

        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .context("open SQLite database")?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// Pinned to a single connection so every query sees the same database.
    #[cfg(test)]
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("open in-memory SQLite")?;
        schema::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check: execute a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

pub(crate) fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid RFC3339 timestamp: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

pub(crate) fn parse_ts_opt(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn health_check_passes() {
        let store = EngagementStore::in_memory().await.unwrap();
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn opens_database_under_workspace() {
        let tmp = TempDir::new().unwrap();
        let store = EngagementStore::new(tmp.path()).await.unwrap();
        assert!(store.health_check().await);
        assert!(tmp.path().join("engagement").join("engagement.db").exists());
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        let ts = parse_ts("2026-08-29T12:00:00+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-08-29T12:00:00+00:00");
        assert!(parse_ts("not-a-timestamp").is_err());
        assert!(parse_ts_opt(None).unwrap().is_none());
    }
}
