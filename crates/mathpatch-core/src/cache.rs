//! Whole-text render memoization.
//!
//! Keys are the full text of a node as it was read before rendering, values
//! are the complete replacement HTML for that node. Chat hosts tend to re-create
//! identical message elements (re-renders, virtualized lists), so keying on
//! the whole text lets those hit without rescanning.
//!
//! The same structure, with `()` values, remembers texts that turned out to
//! hold no complete expression, so an unterminated `$` is scanned once rather
//! than on every pass.
//!
//! Eviction is by insertion order: when full, the oldest inserted entry goes.
//! Lookups do not refresh an entry.

use std::collections::{HashMap, VecDeque};

/// Bounded FIFO cache keyed by node text, holding rendered HTML by default.
#[derive(Clone, Debug)]
pub struct RenderCache<V = String> {
    entries: HashMap<String, V>,
    /// Keys from oldest to newest insertion.
    order: VecDeque<String>,
    capacity: usize,
    hits: u64,
    evictions: u64,
}

impl<V> RenderCache<V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A zero capacity is clamped to one; configs are validated before they
    /// get here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            evictions: 0,
        }
    }

    /// Look up the value for an exact source text.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let found = self.entries.get(key);
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    /// Whether a key is present, without counting a hit.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value for `key`.
    ///
    /// Re-inserting an existing key replaces the value and makes it the
    /// newest entry.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<V>) {
        let key = key.into();

        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.evictions += 1;
                tracing::trace!(
                    target: "mathpatch::render",
                    evicted_len = oldest.len(),
                    "render cache full, evicted oldest entry"
                );
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of successful lookups so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of entries dropped to make room.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}
