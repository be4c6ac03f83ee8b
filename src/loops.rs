use crate::config::EngagementConfig;
use crate::store::{EngagementStore, open_loops};
use crate::topic::topics_match;
use crate::types::{LoopSignal, LoopStatus, OpenLoop};
use crate::user_locks::UserLocks;
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle owner for tracked follow-up topics.
///
/// Creation deduplicates against a user's non-terminal loops with the fuzzy
/// topic rule from [`crate::topic`]; matching signals max-merge salience
/// instead of inserting. The read-then-write sequence is serialized per user
/// because the store offers no uniqueness constraint on normalized topics.
///
/// Store failures are logged and converted into sentinel returns — a sweep
/// never sees an error from this component.
pub struct OpenLoopTracker {
    store: Arc<EngagementStore>,
    default_max_surfaces: u32,
    scope_by_loop_type: bool,
    locks: UserLocks,
}

impl OpenLoopTracker {
    pub fn new(store: Arc<EngagementStore>, config: &EngagementConfig) -> Self {
        Self {
            store,
            default_max_surfaces: config.default_max_surfaces,
            scope_by_loop_type: config.dedup_scope_loop_type,
            locks: UserLocks::new(),
        }
    }

    /// Record a candidate loop signal, deduplicating by topic.
    ///
    /// Returns the stored entity (existing, updated, or freshly inserted), or
    /// `None` on store failure.
    pub async fn create_open_loop(&self, signal: LoopSignal) -> Option<OpenLoop> {
        let salience = signal.salience.clamp(0.0, 1.0);

        let lock = self.locks.lock_for(&signal.user_id);
        let _guard = lock.lock().await;

        let existing = match open_loops::non_terminal_loops(self.store.pool(), &signal.user_id)
            .await
        {
            Ok(loops) => loops,
            Err(e) => {
                tracing::warn!(user = %signal.user_id, "open loop dedup scan failed: {e:#}");
                return None;
            }
        };

        let matched = existing.into_iter().find(|candidate| {
            (!self.scope_by_loop_type || candidate.loop_type == signal.loop_type)
                && topics_match(&candidate.topic, &signal.topic)
        });

        if let Some(mut found) = matched {
            let merged = found.salience.max(salience);
            if merged > found.salience {
                if let Err(e) =
                    open_loops::update_salience(self.store.pool(), &found.id, merged).await
                {
                    tracing::warn!(loop_id = %found.id, "salience update failed: {e:#}");
                    return None;
                }
                found.salience = merged;
            }
            return Some(found);
        }

        let open_loop = OpenLoop {
            id: Uuid::new_v4().to_string(),
            user_id: signal.user_id,
            loop_type: signal.loop_type,
            topic: signal.topic,
            suggested_followup: signal.suggested_followup,
            timeframe: signal.timeframe,
            salience,
            status: LoopStatus::Active,
            surface_count: 0,
            max_surfaces: self.default_max_surfaces,
            created_at: Utc::now(),
            last_mentioned: None,
        };

        if let Err(e) = open_loops::insert_loop(self.store.pool(), &open_loop).await {
            tracing::warn!(user = %open_loop.user_id, "open loop insert failed: {e:#}");
            return None;
        }
        Some(open_loop)
    }

    /// Dismiss every non-terminal loop matching `topic`; returns the count.
    ///
    /// Used when a later message contradicts the premise of a loop ("I don't
    /// have a party"). No write is issued when nothing matches.
    pub async fn dismiss_loops_by_topic(&self, user_id: &str, topic: &str) -> usize {
        let candidates = match open_loops::non_terminal_loops(self.store.pool(), user_id).await {
            Ok(loops) => loops,
            Err(e) => {
                tracing::warn!(user = %user_id, "dismissal scan failed: {e:#}");
                return 0;
            }
        };

        let matched: Vec<String> = candidates
            .into_iter()
            .filter(|candidate| topics_match(&candidate.topic, topic))
            .map(|candidate| candidate.id)
            .collect();

        if matched.is_empty() {
            return 0;
        }

        match open_loops::dismiss_loops(self.store.pool(), &matched).await {
            Ok(count) => usize::try_from(count).unwrap_or(usize::MAX),
            Err(e) => {
                tracing::warn!(user = %user_id, "dismissal write failed: {e:#}");
                0
            }
        }
    }

    /// The highest-salience non-terminal loop still under its surface budget.
    pub async fn top_active_loop(&self, user_id: &str) -> Option<OpenLoop> {
        let candidates = match open_loops::non_terminal_loops(self.store.pool(), user_id).await {
            Ok(loops) => loops,
            Err(e) => {
                tracing::warn!(user = %user_id, "top loop scan failed: {e:#}");
                return None;
            }
        };

        candidates
            .into_iter()
            .filter(|candidate| candidate.surface_count < candidate.max_surfaces)
            .max_by(|a, b| {
                a.salience
                    .partial_cmp(&b.salience)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            })
    }

    /// Stamp a surfacing on a loop after the orchestrator mentions it.
    pub async fn mark_loop_surfaced(&self, id: &str) -> bool {
        match open_loops::mark_surfaced(self.store.pool(), id, Utc::now()).await {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(loop_id = %id, "surfacing stamp failed: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_loops::{insert_loop, non_terminal_loops};
    use crate::types::LoopType;

    fn signal(user: &str, topic: &str, salience: f64) -> LoopSignal {
        LoopSignal {
            user_id: user.into(),
            loop_type: LoopType::PendingEvent,
            topic: topic.into(),
            salience,
            suggested_followup: None,
            timeframe: None,
        }
    }

    async fn tracker() -> OpenLoopTracker {
        let store = Arc::new(EngagementStore::in_memory().await.unwrap());
        OpenLoopTracker::new(store, &EngagementConfig::default())
    }

    #[tokio::test]
    async fn creates_a_fresh_loop() {
        let tracker = tracker().await;
        let created = tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();

        assert_eq!(created.status, LoopStatus::Active);
        assert_eq!(created.surface_count, 0);
        assert_eq!(created.max_surfaces, 3);
        assert!((created.salience - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn dedup_returns_existing_loop_without_insert() {
        let tracker = tracker().await;
        let first = tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();
        let second = tracker
            .create_open_loop(signal("u1", "holiday parties", 0.4))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert!((second.salience - 0.5).abs() < f64::EPSILON);

        let stored = non_terminal_loops(tracker.store.pool(), "u1").await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn dedup_max_merges_salience() {
        let tracker = tracker().await;
        let first = tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();
        let merged = tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.8))
            .await
            .unwrap();

        assert_eq!(merged.id, first.id);
        assert!((merged.salience - 0.8).abs() < f64::EPSILON);

        let stored = non_terminal_loops(tracker.store.pool(), "u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!((stored[0].salience - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn salience_is_clamped_to_unit_interval() {
        let tracker = tracker().await;
        let created = tracker
            .create_open_loop(signal("u1", "overexcited topic", 3.5))
            .await
            .unwrap();
        assert!((created.salience - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn different_users_do_not_dedup_against_each_other() {
        let tracker = tracker().await;
        tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();
        tracker
            .create_open_loop(signal("u2", "Holiday Party", 0.5))
            .await
            .unwrap();

        assert_eq!(
            non_terminal_loops(tracker.store.pool(), "u1").await.unwrap().len(),
            1
        );
        assert_eq!(
            non_terminal_loops(tracker.store.pool(), "u2").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn loop_type_scoping_splits_dedup_when_enabled() {
        let store = Arc::new(EngagementStore::in_memory().await.unwrap());
        let config = EngagementConfig {
            dedup_scope_loop_type: true,
            ..EngagementConfig::default()
        };
        let tracker = OpenLoopTracker::new(store, &config);

        tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();
        let mut emotional = signal("u1", "Holiday Party", 0.5);
        emotional.loop_type = LoopType::EmotionalFollowup;
        tracker.create_open_loop(emotional).await.unwrap();

        let stored = non_terminal_loops(tracker.store.pool(), "u1").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn dismisses_matching_loops_and_skips_terminal_history() {
        let tracker = tracker().await;
        tracker
            .create_open_loop(signal("u1", "Holiday Party", 0.5))
            .await
            .unwrap();
        tracker
            .create_open_loop(signal("u1", "party tonight", 0.4))
            .await
            .unwrap();

        let resolved = OpenLoop {
            id: "resolved-party".into(),
            user_id: "u1".into(),
            loop_type: LoopType::PendingEvent,
            topic: "party".into(),
            suggested_followup: None,
            timeframe: None,
            salience: 0.9,
            status: LoopStatus::Resolved,
            surface_count: 1,
            max_surfaces: 3,
            created_at: Utc::now(),
            last_mentioned: None,
        };
        insert_loop(tracker.store.pool(), &resolved).await.unwrap();

        // The two party loops above fuzzy-match each other, so dedup collapsed
        // them into one row; dismissal still reports what it actually changed.
        let dismissed = tracker.dismiss_loops_by_topic("u1", "party").await;
        assert_eq!(dismissed, 1);

        let remaining = non_terminal_loops(tracker.store.pool(), "u1").await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn dismisses_multiple_matching_rows() {
        let tracker = tracker().await;
        // Seed two already-stored rows that both match "party" without going
        // through dedup, mirroring duplicates created by concurrent writers.
        for (id, topic, status) in [
            ("l1", "Holiday Party", LoopStatus::Active),
            ("l2", "party tonight", LoopStatus::Active),
            ("l3", "party", LoopStatus::Resolved),
        ] {
            let row = OpenLoop {
                id: id.into(),
                user_id: "u1".into(),
                loop_type: LoopType::PendingEvent,
                topic: topic.into(),
                suggested_followup: None,
                timeframe: None,
                salience: 0.5,
                status,
                surface_count: 0,
                max_surfaces: 3,
                created_at: Utc::now(),
                last_mentioned: None,
            };
            insert_loop(tracker.store.pool(), &row).await.unwrap();
        }

        // The resolved loop is inert history and stays untouched.
        assert_eq!(tracker.dismiss_loops_by_topic("u1", "party").await, 2);
        assert_eq!(tracker.dismiss_loops_by_topic("u1", "party").await, 0);
    }

    #[tokio::test]
    async fn dismissal_without_matches_returns_zero() {
        let tracker = tracker().await;
        tracker
            .create_open_loop(signal("u1", "dentist appointment", 0.5))
            .await
            .unwrap();
        assert_eq!(tracker.dismiss_loops_by_topic("u1", "party").await, 0);
    }

    #[tokio::test]
    async fn top_active_loop_prefers_salience_and_respects_budget() {
        let tracker = tracker().await;
        tracker
            .create_open_loop(signal("u1", "dentist appointment", 0.4))
            .await
            .unwrap();
        let strongest = tracker
            .create_open_loop(signal("u1", "job interview", 0.9))
            .await
            .unwrap();

        let top = tracker.top_active_loop("u1").await.unwrap();
        assert_eq!(top.id, strongest.id);

        // Exhaust the surface budget; the weaker loop becomes the top pick.
        for _ in 0..3 {
            assert!(tracker.mark_loop_surfaced(&strongest.id).await);
        }
        let top = tracker.top_active_loop("u1").await.unwrap();
        assert_eq!(top.topic, "dentist appointment");
    }

    #[tokio::test]
    async fn surfacing_moves_loop_to_surfaced_and_counts() {
        let tracker = tracker().await;
        let created = tracker
            .create_open_loop(signal("u1", "job interview", 0.7))
            .await
            .unwrap();

        assert!(tracker.mark_loop_surfaced(&created.id).await);
        let stored = non_terminal_loops(tracker.store.pool(), "u1").await.unwrap();
        assert_eq!(stored[0].status, LoopStatus::Surfaced);
        assert_eq!(stored[0].surface_count, 1);
        assert!(stored[0].last_mentioned.is_some());

        assert!(!tracker.mark_loop_surfaced("missing-loop").await);
    }
}
