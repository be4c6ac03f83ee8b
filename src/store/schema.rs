use anyhow::Context;
use sqlx::SqlitePool;

pub(super) async fn init_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(
        "-- Tracked follow-up topics
        CREATE TABLE IF NOT EXISTS open_loops (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            loop_type           TEXT NOT NULL,
            topic               TEXT NOT NULL,
            suggested_followup  TEXT,
            timeframe           TEXT,
            salience            REAL NOT NULL,
            status              TEXT NOT NULL DEFAULT 'active',
            surface_count       INTEGER NOT NULL DEFAULT 0,
            max_surfaces        INTEGER NOT NULL,
            created_at          TEXT NOT NULL,
            last_mentioned      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_open_loops_user_status
            ON open_loops(user_id, status);

        -- Scheduled future commitments
        CREATE TABLE IF NOT EXISTS promises (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            promise_type        TEXT NOT NULL,
            description         TEXT NOT NULL,
            trigger_event       TEXT NOT NULL,
            estimated_timing    TEXT NOT NULL,
            commitment_context  TEXT NOT NULL,
            fulfillment_data    TEXT,
            status              TEXT NOT NULL DEFAULT 'pending',
            created_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_promises_status_timing
            ON promises(status, estimated_timing);

        -- Whole per-user thread collection as one JSON row
        CREATE TABLE IF NOT EXISTS ongoing_threads (
            user_id     TEXT PRIMARY KEY,
            threads     TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
    .execute(pool)
    .await
    .context("initialize engagement schema")?;

    Ok(())
}
