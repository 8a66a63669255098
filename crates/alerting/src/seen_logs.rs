//! Seen Log Lines

use std::collections::{HashMap, HashSet, VecDeque};

/// Log line ids remembered per service
pub const DEFAULT_SEEN_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct SeenLines {
    /// Insertion order, oldest first
    order: VecDeque<String>,
    ids: HashSet<String>,
}

/// Per-service record of error lines already alerted on.
///
/// Each service keeps at most `capacity` ids; the oldest is forgotten first,
/// so a line can only alert again after it scrolled out of both the provider
/// tail and this window.
#[derive(Debug)]
pub struct SeenLogCache {
    capacity: usize,
    services: HashMap<String, SeenLines>,
}

impl SeenLogCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            services: HashMap::new(),
        }
    }

    pub fn contains(&self, service_id: &str, line_id: &str) -> bool {
        self.services
            .get(service_id)
            .is_some_and(|seen| seen.ids.contains(line_id))
    }

    /// Remember `line_id`; false when it was already known
    pub fn insert(&mut self, service_id: &str, line_id: &str) -> bool {
        let seen = self.services.entry(service_id.to_string()).or_default();
        if seen.ids.contains(line_id) {
            return false;
        }
        if seen.order.len() >= self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.ids.remove(&oldest);
            }
        }
        seen.order.push_back(line_id.to_string());
        seen.ids.insert(line_id.to_string());
        true
    }

    /// Drop everything remembered for a service
    pub fn forget(&mut self, service_id: &str) {
        self.services.remove(service_id);
    }

    pub fn len(&self, service_id: &str) -> usize {
        self.services.get(service_id).map_or(0, |seen| seen.order.len())
    }
}

impl Default for SeenLogCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_LOG_CAPACITY)
    }
}
