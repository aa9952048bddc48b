//! Bounded set of already-processed signatures
//!
//! Insertion order is tracked so that trimming drops the oldest entries and
//! keeps the most recently seen ones.

use std::collections::{HashSet, VecDeque};

/// Insertion-ordered signature set with bounded eviction
#[derive(Debug, Clone)]
pub struct SignatureSet {
    order: VecDeque<String>,
    seen: HashSet<String>,
    /// Trim once the set grows past this many entries
    capacity: usize,
    /// Entries kept after a trim
    retain: usize,
}

impl SignatureSet {
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            seen: HashSet::with_capacity(capacity + 1),
            capacity,
            retain: retain.min(capacity),
        }
    }

    /// Mark a signature as seen. Returns `false` if it already was.
    pub fn insert(&mut self, signature: &str) -> bool {
        if self.seen.contains(signature) {
            return false;
        }

        self.seen.insert(signature.to_string());
        self.order.push_back(signature.to_string());

        if self.order.len() > self.capacity {
            self.trim();
        }

        true
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn trim(&mut self) {
        let excess = self.order.len().saturating_sub(self.retain);
        for sig in self.order.drain(..excess) {
            self.seen.remove(&sig);
        }
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::new(1000, 500)
    }
}
