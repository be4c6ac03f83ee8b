use super::parse_ts;
use crate::types::{FulfillmentData, Promise, PromiseStatus, PromiseType};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;

type PromiseRow = (
    String,         // id
    String,         // user_id
    String,         // promise_type
    String,         // description
    String,         // trigger_event
    String,         // estimated_timing
    String,         // commitment_context
    Option<String>, // fulfillment_data (json)
    String,         // status
    String,         // created_at
);

const PROMISE_COLUMNS: &str = "id, user_id, promise_type, description, trigger_event, \
     estimated_timing, commitment_context, fulfillment_data, status, created_at";

fn decode_row(row: PromiseRow) -> anyhow::Result<Promise> {
    let (
        id,
        user_id,
        promise_type_raw,
        description,
        trigger_event,
        estimated_timing_raw,
        commitment_context,
        fulfillment_data_raw,
        status_raw,
        created_at_raw,
    ) = row;

    let fulfillment_data = fulfillment_data_raw
        .as_deref()
        .map(|raw| {
            serde_json::from_str::<FulfillmentData>(raw)
                .with_context(|| format!("invalid fulfillment_data for promise {id}"))
        })
        .transpose()?;

    Ok(Promise {
        id,
        user_id,
        promise_type: PromiseType::from_str(&promise_type_raw)?,
        description,
        trigger_event,
        estimated_timing: parse_ts(&estimated_timing_raw)?,
        commitment_context,
        fulfillment_data,
        status: PromiseStatus::from_str(&status_raw)?,
        created_at: parse_ts(&created_at_raw)?,
    })
}

pub(crate) async fn insert_promise(pool: &SqlitePool, promise: &Promise) -> anyhow::Result<()> {
    let fulfillment_data = promise
        .fulfillment_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("encode fulfillment_data")?;

    sqlx::query(
        "INSERT INTO promises (
            id, user_id, promise_type, description, trigger_event,
            estimated_timing, commitment_context, fulfillment_data, status, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&promise.id)
    .bind(&promise.user_id)
    .bind(promise.promise_type.to_string())
    .bind(&promise.description)
    .bind(&promise.trigger_event)
    .bind(promise.estimated_timing.to_rfc3339())
    .bind(&promise.commitment_context)
    .bind(fulfillment_data)
    .bind(promise.status.to_string())
    .bind(promise.created_at.to_rfc3339())
    .execute(pool)
    .await
    .context("insert promise")?;
    Ok(())
}

pub(crate) async fn promise_by_id(
    pool: &SqlitePool,
    id: &str,
) -> anyhow::Result<Option<Promise>> {
    let row: Option<PromiseRow> =
        sqlx::query_as(&format!("SELECT {PROMISE_COLUMNS} FROM promises WHERE id = ?1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("query promise by id")?;

    row.map(decode_row).transpose()
}

/// Pending promises whose scheduled time has arrived, soonest first.
pub(crate) async fn ready_promises(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<Promise>> {
    let rows: Vec<PromiseRow> = sqlx::query_as(&format!(
        "SELECT {PROMISE_COLUMNS} FROM promises
         WHERE status = 'pending' AND estimated_timing <= ?1
         ORDER BY estimated_timing ASC, id ASC"
    ))
    .bind(now.to_rfc3339())
    .fetch_all(pool)
    .await
    .context("query ready promises")?;

    rows.into_iter().map(decode_row).collect()
}

/// All pending promises regardless of timing, soonest first.
pub(crate) async fn pending_promises(pool: &SqlitePool) -> anyhow::Result<Vec<Promise>> {
    let rows: Vec<PromiseRow> = sqlx::query_as(&format!(
        "SELECT {PROMISE_COLUMNS} FROM promises
         WHERE status = 'pending'
         ORDER BY estimated_timing ASC, id ASC"
    ))
    .fetch_all(pool)
    .await
    .context("query pending promises")?;

    rows.into_iter().map(decode_row).collect()
}

/// Conditional status transition out of `pending`; the affected-row count
/// tells the caller whether it won the transition.
pub(crate) async fn transition_if_pending(
    pool: &SqlitePool,
    id: &str,
    to: PromiseStatus,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE promises SET status = ?1 WHERE id = ?2 AND status = 'pending'",
    )
    .bind(to.to_string())
    .bind(id)
    .execute(pool)
    .await
    .context("transition promise status")?;

    Ok(result.rows_affected() > 0)
}

/// Delete terminal promises created before the cutoff.
pub(crate) async fn delete_terminal_before(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM promises
         WHERE status IN ('fulfilled', 'cancelled') AND created_at < ?1",
    )
    .bind(cutoff.to_rfc3339())
    .execute(pool)
    .await
    .context("delete old terminal promises")?;

    Ok(result.rows_affected())
}
