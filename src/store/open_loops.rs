use super::{parse_ts, parse_ts_opt};
use crate::types::{LoopStatus, LoopType, OpenLoop, Timeframe};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;

type LoopRow = (
    String,         // id
    String,         // user_id
    String,         // loop_type
    String,         // topic
    Option<String>, // suggested_followup
    Option<String>, // timeframe
    f64,            // salience
    String,         // status
    i64,            // surface_count
    i64,            // max_surfaces
    String,         // created_at
    Option<String>, // last_mentioned
);

const LOOP_COLUMNS: &str = "id, user_id, loop_type, topic, suggested_followup, timeframe, \
     salience, status, surface_count, max_surfaces, created_at, last_mentioned";

fn decode_row(row: LoopRow) -> anyhow::Result<OpenLoop> {
    let (
        id,
        user_id,
        loop_type_raw,
        topic,
        suggested_followup,
        timeframe_raw,
        salience,
        status_raw,
        surface_count,
        max_surfaces,
        created_at_raw,
        last_mentioned_raw,
    ) = row;

    Ok(OpenLoop {
        id,
        user_id,
        loop_type: LoopType::from_str(&loop_type_raw)?,
        topic,
        suggested_followup,
        timeframe: timeframe_raw
            .as_deref()
            .map(Timeframe::from_str)
            .transpose()?,
        salience,
        status: LoopStatus::from_str(&status_raw)?,
        surface_count: u32::try_from(surface_count).unwrap_or(0),
        max_surfaces: u32::try_from(max_surfaces).unwrap_or(1),
        created_at: parse_ts(&created_at_raw)?,
        last_mentioned: parse_ts_opt(last_mentioned_raw.as_deref())?,
    })
}

pub(crate) async fn insert_loop(pool: &SqlitePool, open_loop: &OpenLoop) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO open_loops (
            id, user_id, loop_type, topic, suggested_followup, timeframe,
            salience, status, surface_count, max_surfaces, created_at, last_mentioned
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&open_loop.id)
    .bind(&open_loop.user_id)
    .bind(open_loop.loop_type.to_string())
    .bind(&open_loop.topic)
    .bind(&open_loop.suggested_followup)
    .bind(open_loop.timeframe.map(|t| t.to_string()))
    .bind(open_loop.salience)
    .bind(open_loop.status.to_string())
    .bind(i64::from(open_loop.surface_count))
    .bind(i64::from(open_loop.max_surfaces))
    .bind(open_loop.created_at.to_rfc3339())
    .bind(open_loop.last_mentioned.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await
    .context("insert open loop")?;
    Ok(())
}

/// All `active` / `surfaced` loops for a user, oldest first.
pub(crate) async fn non_terminal_loops(
    pool: &SqlitePool,
    user_id: &str,
) -> anyhow::Result<Vec<OpenLoop>> {
    let rows: Vec<LoopRow> = sqlx::query_as(&format!(
        "SELECT {LOOP_COLUMNS} FROM open_loops
         WHERE user_id = ?1 AND status IN ('active', 'surfaced')
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("query non-terminal open loops")?;

    rows.into_iter().map(decode_row).collect()
}

pub(crate) async fn update_salience(
    pool: &SqlitePool,
    id: &str,
    salience: f64,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE open_loops SET salience = ?1 WHERE id = ?2")
        .bind(salience)
        .bind(id)
        .execute(pool)
        .await
        .context("update open loop salience")?;
    Ok(())
}

/// Dismiss the given loops; returns the number of rows actually changed.
pub(crate) async fn dismiss_loops(pool: &SqlitePool, ids: &[String]) -> anyhow::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = std::iter::repeat_n("?", ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "UPDATE open_loops SET status = 'dismissed'
         WHERE id IN ({placeholders}) AND status IN ('active', 'surfaced')"
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    let result = query.execute(pool).await.context("dismiss open loops")?;
    Ok(result.rows_affected())
}

/// Stamp a surfacing: bump the counter, record the mention, move to `surfaced`.
pub(crate) async fn mark_surfaced(
    pool: &SqlitePool,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE open_loops
         SET status = 'surfaced', surface_count = surface_count + 1, last_mentioned = ?1
         WHERE id = ?2 AND status IN ('active', 'surfaced')",
    )
    .bind(now.to_rfc3339())
    .bind(id)
    .execute(pool)
    .await
    .context("mark open loop surfaced")?;

    Ok(result.rows_affected() > 0)
}
