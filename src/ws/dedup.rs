//! Status dedup cache.
//!
//! Tracks the last status seen per entity id so that repeated status
//! updates are suppressed on the named channel. The raw `CB:` channel is
//! always fed.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

/// Outcome of observing one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupDecision {
    /// Emit on the named event channel.
    pub primary: bool,
    /// Emit on the raw correlation channel. Always `true`.
    pub raw: bool,
}

impl DedupDecision {
    const EMIT: Self = Self {
        primary: true,
        raw: true,
    };
    const SUPPRESS: Self = Self {
        primary: false,
        raw: true,
    };
}

/// Entity id → last seen status.
#[derive(Debug, Default)]
pub struct DedupCache {
    statuses: HashMap<String, String>,
    /// Insertion order, only tracked when a capacity is set.
    order: VecDeque<String>,
    capacity: Option<usize>,
}

impl DedupCache {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that forgets the oldest-inserted entity once `capacity` ids are held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            statuses: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Last cached status for an entity.
    pub fn status_of(&self, id: &str) -> Option<&str> {
        self.statuses.get(id).map(String::as_str)
    }

    /// Record a payload and decide where it is emitted.
    ///
    /// Payloads without a usable `id` or `status` always pass through.
    pub fn observe(&mut self, payload: &Value) -> DedupDecision {
        let (Some(id), Some(status)) = (key_field(payload, "id"), key_field(payload, "status"))
        else {
            return DedupDecision::EMIT;
        };

        match self.statuses.get_mut(&id) {
            Some(cached) if *cached == status => DedupDecision::SUPPRESS,
            Some(cached) => {
                *cached = status;
                DedupDecision::EMIT
            }
            None => {
                self.insert(id, status);
                DedupDecision::EMIT
            }
        }
    }

    fn insert(&mut self, id: String, status: String) {
        if let Some(capacity) = self.capacity {
            while self.order.len() >= capacity {
                match self.order.pop_front() {
                    Some(evicted) => {
                        self.statuses.remove(&evicted);
                    }
                    None => break,
                }
            }
            self.order.push_back(id.clone());
        }
        self.statuses.insert(id, status);
    }
}

/// A string or numeric field rendered as a string key.
fn key_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
