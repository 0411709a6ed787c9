//! Viewport-aware scheduling of candidate nodes.
//!
//! Nodes within the viewport (plus a margin) are processed right away, in
//! document order. Everything else gets a one-shot visibility subscription and
//! is processed the first time it scrolls into range. This bounds the work done
//! per pass on long conversations while still rendering whatever the user
//! eventually looks at.

use std::collections::HashSet;

use crate::host::HostDocument;

/// Result of splitting candidates by viewport distance.
#[derive(Debug)]
pub struct Partition<N> {
    /// Process now, in document order.
    pub immediate: Vec<N>,
    /// Newly subscribed for a later intersection.
    pub deferred: Vec<N>,
}

#[derive(Debug)]
pub struct VisibilityScheduler<N> {
    margin: f64,
    /// Nodes with a live subscription.
    pending: HashSet<N>,
}

impl<N> VisibilityScheduler<N>
where
    N: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    pub fn new(margin: f64) -> Self {
        Self {
            margin,
            pending: HashSet::new(),
        }
    }

    /// Split unprocessed candidates into immediate and deferred sets.
    ///
    /// A node already waiting on a subscription is not subscribed twice. If
    /// it has since come near the viewport its subscription is dropped and it
    /// goes to the immediate set.
    pub fn partition<H>(&mut self, host: &mut H, candidates: Vec<N>) -> Partition<N>
    where
        H: HostDocument<Node = N>,
    {
        let mut immediate = Vec::new();
        let mut deferred = Vec::new();

        for node in candidates {
            if host.is_near_viewport(&node, self.margin) {
                if self.pending.remove(&node) {
                    host.unobserve_visibility(&node);
                }
                immediate.push(node);
            } else if !self.pending.contains(&node) {
                host.observe_visibility(&node);
                self.pending.insert(node.clone());
                deferred.push(node);
            }
        }

        Partition {
            immediate,
            deferred,
        }
    }

    /// Drop subscriptions for nodes that are no longer candidates.
    ///
    /// Hosts remove and re-create elements (re-renders, virtualized lists).
    /// Pending nodes missing from `candidates` are unsubscribed and
    /// forgotten. Returns the number dropped.
    pub fn retain_candidates<H>(&mut self, host: &mut H, candidates: &[N]) -> usize
    where
        H: HostDocument<Node = N>,
    {
        if self.pending.is_empty() {
            return 0;
        }
        let live: HashSet<&N> = candidates.iter().collect();
        let stale: Vec<N> = self
            .pending
            .iter()
            .filter(|node| !live.contains(node))
            .cloned()
            .collect();

        for node in &stale {
            self.pending.remove(node);
            host.unobserve_visibility(node);
        }
        stale.len()
    }

    /// Consume the subscription for a node that just intersected.
    ///
    /// Returns false if there was no live subscription (already fired, or
    /// processed eagerly in the meantime).
    pub fn take_intersection<H>(&mut self, host: &mut H, node: &N) -> bool
    where
        H: HostDocument<Node = N>,
    {
        if !self.pending.remove(node) {
            return false;
        }
        host.unobserve_visibility(node);
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
