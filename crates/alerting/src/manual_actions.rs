//! Manual-action Marks

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

/// Expiring per-service marks left by our own lifecycle actions.
///
/// The map holds the current expiry for each service; the min-heap orders
/// expirations so `purge` only touches what is due. A re-mark leaves a stale
/// heap entry behind, which `purge` recognises by comparing against the map.
#[derive(Debug)]
pub struct ManualActionCache {
    window: Duration,
    expiries: HashMap<String, Instant>,
    heap: BinaryHeap<Reverse<(Instant, String)>>,
}

impl ManualActionCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            expiries: HashMap::new(),
            heap: BinaryHeap::new(),
        }
    }

    /// Mark `service_id` as changed by us at `now`
    pub fn mark(&mut self, service_id: &str, now: Instant) {
        self.purge(now);
        let expiry = now + self.window;
        self.expiries.insert(service_id.to_string(), expiry);
        self.heap.push(Reverse((expiry, service_id.to_string())));
        debug!(service_id, window_secs = self.window.as_secs(), "Manual action marked");
    }

    /// Whether a mark for `service_id` is still live at `now`
    pub fn is_active(&self, service_id: &str, now: Instant) -> bool {
        self.expiries
            .get(service_id)
            .is_some_and(|expiry| *expiry > now)
    }

    /// Drop every mark that expired at or before `now`
    pub fn purge(&mut self, now: Instant) {
        while let Some(Reverse((expiry, _))) = self.heap.peek() {
            if *expiry > now {
                break;
            }
            let Some(Reverse((expiry, service_id))) = self.heap.pop() else {
                break;
            };
            if self.expiries.get(&service_id) == Some(&expiry) {
                self.expiries.remove(&service_id);
            }
        }
    }

    /// Live marks, ignoring ones not yet purged
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
