use crate::config::Config;
use crate::promises::PromiseLedger;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::{self, Duration};

const MIN_POLL_SECONDS: u64 = 5;
const CLEANUP_INTERVAL_HOURS: i64 = 24;

/// Periodic promise sweep: fulfill due promises every tick, prune old
/// terminal promises once a day. Store failures are logged and the loop
/// keeps running.
pub async fn run(config: Arc<Config>, ledger: Arc<PromiseLedger>) -> Result<()> {
    let poll_secs = config.engagement.sweep_poll_secs.max(MIN_POLL_SECONDS);
    let mut interval = time::interval(Duration::from_secs(poll_secs));
    let mut last_cleanup: Option<DateTime<Utc>> = None;

    tracing::info!(poll_secs, "promise sweep started");

    loop {
        interval.tick().await;
        let now = Utc::now();

        let batch = ledger.check_and_fulfill_promises(now).await;
        if batch > 0 {
            tracing::info!(count = batch, "sweep processed due promises");
        }

        if last_cleanup.is_none_or(|at| now - at >= ChronoDuration::hours(CLEANUP_INTERVAL_HOURS))
        {
            let cutoff = now - ChronoDuration::days(config.engagement.promise_retention_days);
            let removed = ledger.cleanup_old_promises(cutoff).await;
            if removed > 0 {
                tracing::info!(removed, "pruned old terminal promises");
            }
            last_cleanup = Some(now);
        }
    }
}
