use crate::config::EngagementConfig;
use crate::store::{EngagementStore, threads};
use crate::types::OngoingThread;
use crate::user_locks::UserLocks;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Pick the ongoing thread most worth sharing proactively, if any.
///
/// Eligibility: intensity at or above the floor, never mentioned or past the
/// cooldown, and old enough to have settled. Among eligible threads the
/// winner is the highest intensity plus a flat boost for user-related ones;
/// ties keep the earliest candidate for determinism.
pub fn select_proactive_thread<'a>(
    candidates: &'a [OngoingThread],
    now: DateTime<Utc>,
    config: &EngagementConfig,
) -> Option<&'a OngoingThread> {
    let cooldown = Duration::hours(config.thread_cooldown_hours);
    let min_age = Duration::hours(config.thread_min_age_hours);

    candidates
        .iter()
        .filter(|thread| {
            thread.intensity >= config.min_thread_intensity
                && thread
                    .last_mentioned
                    .is_none_or(|mentioned| now - mentioned > cooldown)
                && now - thread.created_at >= min_age
        })
        .max_by(|a, b| {
            score(a, config)
                .partial_cmp(&score(b, config))
                .unwrap_or(Ordering::Equal)
                // max_by keeps the later of equal elements; invert so the
                // earliest candidate wins ties.
                .then(Ordering::Greater)
        })
}

fn score(thread: &OngoingThread, config: &EngagementConfig) -> f64 {
    let boost = if thread.user_related {
        config.user_related_boost
    } else {
        0.0
    };
    thread.intensity + boost
}

/// Store-facing companion to [`select_proactive_thread`].
///
/// The backing store keeps each user's threads as one whole collection, so
/// the mention stamp is a read-modify-write of that collection, serialized
/// per user.
pub struct ThreadJournal {
    store: Arc<EngagementStore>,
    locks: UserLocks,
}

impl ThreadJournal {
    pub fn new(store: Arc<EngagementStore>) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
        }
    }

    /// All threads for a user; empty on store failure.
    pub async fn threads_for(&self, user_id: &str) -> Vec<OngoingThread> {
        match threads::threads_for(self.store.pool(), user_id).await {
            Ok(collection) => collection,
            Err(e) => {
                tracing::warn!(user = %user_id, "thread collection read failed: {e:#}");
                Vec::new()
            }
        }
    }

    /// Replace a user's thread collection wholesale.
    pub async fn put_threads(&self, user_id: &str, collection: &[OngoingThread]) -> bool {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        match threads::replace_threads(self.store.pool(), user_id, collection, Utc::now()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user = %user_id, "thread collection write failed: {e:#}");
                false
            }
        }
    }

    /// Stamp `last_mentioned = now` on one thread, leaving the rest untouched.
    pub async fn mark_thread_mentioned(&self, user_id: &str, thread_id: &str) -> bool {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut collection = match threads::threads_for(self.store.pool(), user_id).await {
            Ok(collection) => collection,
            Err(e) => {
                tracing::warn!(user = %user_id, "thread mention read failed: {e:#}");
                return false;
            }
        };

        let Some(target) = collection.iter_mut().find(|thread| thread.id == thread_id) else {
            return false;
        };
        target.last_mentioned = Some(Utc::now());

        match threads::replace_threads(self.store.pool(), user_id, &collection, Utc::now()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user = %user_id, "thread mention write failed: {e:#}");
                false
            }
        }
    }
}
