//! Subscription manager: per-subscription monitored-item sets, bounded FIFO
//! queues with drop-oldest overflow, live SSE fanout, and drain-on-demand
//! synchronization.
//!
//! Delivery is at-least-once: a value reaches the pending queue before any
//! SSE write is attempted, and `sync` drains whatever SSE may or may not
//! have already sent. Consumers deduplicate on `(elementId, timestamp)` if
//! they need to.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use i3x_core::{now_rfc3339, ObjectValue, DEFAULT_QUALITY};

/// Default bound on a subscription's pending queue.
pub const DEFAULT_QUEUE_HIGH_WATER_MARK: usize = 10_000;

/// Creation parameters, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSubscription {
    pub monitored_items: Vec<String>,
    pub max_depth: Option<usize>,
    pub queue_high_water_mark: Option<usize>,
}

/// Public snapshot of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub subscription_id: Uuid,
    pub created_at: String,
    pub monitored_items: Vec<String>,
    pub max_depth: usize,
    pub queue_high_water_mark: usize,
    /// Values currently pending in the queue.
    pub queued: usize,
    /// Whether an SSE connection is attached.
    pub streaming: bool,
}

struct SubscriptionState {
    created_at: String,
    monitored_items: HashSet<String>,
    max_depth: usize,
    queue_high_water_mark: usize,
    pending: VecDeque<ObjectValue>,
    /// At most one live SSE binding; frames are pre-rendered JSON text.
    sse: Option<mpsc::UnboundedSender<String>>,
}

impl SubscriptionState {
    fn info(&self, id: Uuid) -> SubscriptionInfo {
        let mut monitored_items: Vec<String> = self.monitored_items.iter().cloned().collect();
        monitored_items.sort();
        SubscriptionInfo {
            subscription_id: id,
            created_at: self.created_at.clone(),
            monitored_items,
            max_depth: self.max_depth,
            queue_high_water_mark: self.queue_high_water_mark,
            queued: self.pending.len(),
            streaming: self.sse.is_some(),
        }
    }
}

/// Manages every live subscription.
///
/// A single coarse lock guards the subscription table; all operations are
/// short and non-blocking.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: Mutex<HashMap<Uuid, SubscriptionState>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a subscription and return its snapshot.
    pub fn create(&self, params: CreateSubscription) -> SubscriptionInfo {
        let id = Uuid::new_v4();
        let state = SubscriptionState {
            created_at: now_rfc3339(),
            monitored_items: params.monitored_items.into_iter().collect(),
            max_depth: params.max_depth.unwrap_or(0),
            queue_high_water_mark: params
                .queue_high_water_mark
                .unwrap_or(DEFAULT_QUEUE_HIGH_WATER_MARK)
                .max(1),
            pending: VecDeque::new(),
            sse: None,
        };
        let info = state.info(id);
        self.subscriptions.lock().insert(id, state);
        info!(subscription_id = %id, "created subscription");
        info
    }

    pub fn list(&self) -> Vec<SubscriptionInfo> {
        self.subscriptions
            .lock()
            .iter()
            .map(|(id, s)| s.info(*id))
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<SubscriptionInfo> {
        self.subscriptions.lock().get(&id).map(|s| s.info(id))
    }

    /// Delete a subscription: ends any attached stream, drops the queue.
    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.subscriptions.lock().remove(&id).is_some();
        if removed {
            info!(subscription_id = %id, "deleted subscription");
        }
        removed
    }

    /// Add monitored items. Unknown subscription → `None`.
    pub fn register_items(&self, id: Uuid, element_ids: &[String]) -> Option<SubscriptionInfo> {
        let mut subs = self.subscriptions.lock();
        let state = subs.get_mut(&id)?;
        state
            .monitored_items
            .extend(element_ids.iter().cloned());
        Some(state.info(id))
    }

    /// Remove monitored items. Unknown subscription → `None`.
    pub fn unregister_items(&self, id: Uuid, element_ids: &[String]) -> Option<SubscriptionInfo> {
        let mut subs = self.subscriptions.lock();
        let state = subs.get_mut(&id)?;
        for element_id in element_ids {
            state.monitored_items.remove(element_id);
        }
        Some(state.info(id))
    }

    /// Attach an SSE binding, returning the frame receiver. A second attach
    /// ends the first: its sender is dropped, so its stream terminates.
    pub fn attach_sse(&self, id: Uuid) -> Option<mpsc::UnboundedReceiver<String>> {
        let mut subs = self.subscriptions.lock();
        let state = subs.get_mut(&id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        if state.sse.replace(tx).is_some() {
            debug!(subscription_id = %id, "replaced existing SSE binding");
        }
        Some(rx)
    }

    /// Drop the SSE binding, keeping the subscription and its queue.
    pub fn detach_sse(&self, id: Uuid) {
        if let Some(state) = self.subscriptions.lock().get_mut(&id) {
            if state.sse.take().is_some() {
                debug!(subscription_id = %id, "detached SSE binding");
            }
        }
    }

    /// Atomically remove and return the full pending queue. Unknown
    /// subscription → `None`.
    pub fn sync(&self, id: Uuid) -> Option<Vec<ObjectValue>> {
        let mut subs = self.subscriptions.lock();
        let state = subs.get_mut(&id)?;
        Some(state.pending.drain(..).collect())
    }

    /// Fan a store change out to every subscription monitoring the element.
    ///
    /// The value is queued first (evicting the oldest entry at the high
    /// water mark), then offered to the SSE binding; a failed send means the
    /// client is gone and the binding is detached, while the queue keeps the
    /// update for a later sync.
    pub fn notify_change(&self, element_id: &str, value: &ObjectValue) {
        let mut subs = self.subscriptions.lock();
        for (id, state) in subs.iter_mut() {
            if !state.monitored_items.contains(element_id) {
                continue;
            }
            if state.pending.len() >= state.queue_high_water_mark {
                state.pending.pop_front();
                debug!(subscription_id = %id, element_id, "queue full, dropped oldest");
            }
            state.pending.push_back(value.clone());

            if let Some(tx) = &state.sse {
                if tx.send(sse_frame(element_id, value)).is_err() {
                    debug!(subscription_id = %id, "SSE client gone, detaching");
                    state.sse = None;
                }
            }
        }
    }
}

/// Render the SSE wire frame for one update: an array holding a single
/// object keyed by element id. Absent quality is reported as "Good" on this
/// path only.
pub fn sse_frame(element_id: &str, value: &ObjectValue) -> String {
    let body = serde_json::json!([{
        element_id: {
            "data": [{
                "value": value.value,
                "quality": value.quality.as_deref().unwrap_or(DEFAULT_QUALITY),
                "timestamp": value.timestamp,
            }]
        }
    }]);
    body.to_string()
}
