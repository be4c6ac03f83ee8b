use crate::store::{EngagementStore, promises};
use crate::types::{
    PendingMessage, PendingMessageRequest, Promise, PromiseDraft, PromiseStatus,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// External queue for outbound messages delivered when the user next shows up.
pub trait PendingMessageSink: Send + Sync {
    fn create_pending_message(
        &self,
        request: PendingMessageRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PendingMessage>> + Send + '_>>;
}

/// Owner of scheduled future commitments.
///
/// Fulfillment invokes the message sink before flipping the promise status;
/// if the status write then fails the promise stays `pending` and the next
/// sweep retries, so delivery is at-least-once. An in-process single-flight
/// guard keeps overlapping sweeps from double-sending the same promise, and
/// the status flip itself is conditional on `pending` so a lost race at the
/// store is detected rather than silently double-applied.
pub struct PromiseLedger {
    store: Arc<EngagementStore>,
    sink: Arc<dyn PendingMessageSink>,
    in_flight: Mutex<HashSet<String>>,
}

impl PromiseLedger {
    pub fn new(store: Arc<EngagementStore>, sink: Arc<dyn PendingMessageSink>) -> Self {
        Self {
            store,
            sink,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Record a new commitment; `None` on store failure.
    pub async fn create_promise(&self, draft: PromiseDraft) -> Option<Promise> {
        let fulfillment_data = match draft.fulfillment_data {
            Some(payload) if payload.promise_type() != draft.promise_type => {
                tracing::warn!(
                    promise_type = %draft.promise_type,
                    payload_type = %payload.promise_type(),
                    "fulfillment payload does not match promise type; dropping payload"
                );
                None
            }
            other => other,
        };

        let promise = Promise {
            id: Uuid::new_v4().to_string(),
            user_id: draft.user_id,
            promise_type: draft.promise_type,
            description: draft.description,
            trigger_event: draft.trigger_event,
            estimated_timing: draft.estimated_timing,
            commitment_context: draft.commitment_context,
            fulfillment_data,
            status: PromiseStatus::Pending,
            created_at: Utc::now(),
        };

        if let Err(e) = promises::insert_promise(self.store.pool(), &promise).await {
            tracing::warn!(user = %promise.user_id, "promise insert failed: {e:#}");
            return None;
        }
        Some(promise)
    }

    /// Pending promises whose time has come, soonest first; empty on failure.
    pub async fn get_ready_promises(&self, now: DateTime<Utc>) -> Vec<Promise> {
        match promises::ready_promises(self.store.pool(), now).await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("ready promise query failed: {e:#}");
                Vec::new()
            }
        }
    }

    /// All pending promises regardless of timing (introspection).
    pub async fn get_pending_promises(&self) -> Vec<Promise> {
        match promises::pending_promises(self.store.pool()).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("pending promise query failed: {e:#}");
                Vec::new()
            }
        }
    }

    /// Fulfill one promise: emit its outbound message, then mark it fulfilled.
    ///
    /// Returns `false` for unknown ids, already-terminal promises, promises
    /// already being fulfilled by a concurrent sweep, and store/sink failures.
    /// The sink is never invoked in the `false`-before-send cases.
    pub async fn fulfill_promise(&self, id: &str) -> bool {
        let promise = match promises::promise_by_id(self.store.pool(), id).await {
            Ok(Some(promise)) => promise,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(promise_id = %id, "promise fetch failed: {e:#}");
                return false;
            }
        };

        if promise.status != PromiseStatus::Pending {
            tracing::debug!(promise_id = %id, status = %promise.status, "promise already settled");
            return false;
        }

        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight, id) else {
            tracing::debug!(promise_id = %id, "promise fulfillment already in flight");
            return false;
        };

        let request = build_message_request(&promise);
        if let Err(e) = self.sink.create_pending_message(request).await {
            tracing::warn!(promise_id = %id, "pending message creation failed: {e:#}");
            return false;
        }

        match promises::transition_if_pending(self.store.pool(), id, PromiseStatus::Fulfilled).await
        {
            Ok(true) => true,
            Ok(false) => {
                // Lost the status race after the message went out; the other
                // writer owns the transition.
                tracing::warn!(promise_id = %id, "promise settled concurrently after send");
                false
            }
            Err(e) => {
                // Message already queued but the promise stays pending; the
                // next sweep retries and may duplicate the send.
                tracing::warn!(promise_id = %id, "promise status update failed after send: {e:#}");
                false
            }
        }
    }

    /// Sweep entry point: fulfill every due promise sequentially.
    ///
    /// Returns the batch size (how many were found ready), not the success
    /// count; failures are logged and retried on the next sweep.
    pub async fn check_and_fulfill_promises(&self, now: DateTime<Utc>) -> usize {
        let ready = self.get_ready_promises(now).await;
        let batch = ready.len();

        for promise in &ready {
            if !self.fulfill_promise(&promise.id).await {
                tracing::warn!(promise_id = %promise.id, "promise fulfillment did not complete");
            }
        }

        batch
    }

    /// Cancel a pending promise. Store errors are swallowed and logged.
    pub async fn cancel_promise(&self, id: &str) {
        match promises::transition_if_pending(self.store.pool(), id, PromiseStatus::Cancelled).await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(promise_id = %id, "cancel skipped; promise not pending");
            }
            Err(e) => {
                tracing::warn!(promise_id = %id, "promise cancel failed: {e:#}");
            }
        }
    }

    /// Delete terminal promises created before the cutoff; 0 on failure.
    pub async fn cleanup_old_promises(&self, retention_cutoff: DateTime<Utc>) -> u64 {
        match promises::delete_terminal_before(self.store.pool(), retention_cutoff).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("promise retention cleanup failed: {e:#}");
                0
            }
        }
    }
}

fn build_message_request(promise: &Promise) -> PendingMessageRequest {
    let message_text = promise
        .fulfillment_data
        .as_ref()
        .and_then(|payload| payload.message_text())
        .unwrap_or_else(|| promise.promise_type.default_message_text())
        .to_string();

    let mut metadata = json!({ "promise_id": promise.id });
    if let Some(params) = promise
        .fulfillment_data
        .as_ref()
        .and_then(|payload| payload.selfie_params())
    {
        metadata["selfie_params"] = params.clone();
    }

    PendingMessageRequest {
        message_text,
        message_type: promise.promise_type.message_type(),
        trigger: "promise".into(),
        priority: "normal".into(),
        metadata,
    }
}

/// Removes the promise id from the in-flight set on drop.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(set: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut in_flight = set.lock().expect("in-flight set poisoned");
        if !in_flight.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.set.lock() {
            in_flight.remove(&self.id);
        }
    }
}
