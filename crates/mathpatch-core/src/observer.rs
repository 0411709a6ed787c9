//! Mutation filtering and debounced rescans.
//!
//! Streaming chat replies arrive a few characters at a time, each one a
//! mutation. Every qualifying batch re-arms a single timer; only when the
//! document has been quiet for the whole debounce interval does a rescan run.

use std::time::Duration;

use crate::host::{HostDocument, Mutation, TimerId};
use crate::scanner::{Delimiters, might_contain_math};

#[derive(Debug)]
pub struct ChangeObserver {
    delimiters: Delimiters,
    debounce: Duration,
    armed: Option<TimerId>,
    qualifying_batches: u64,
}

impl ChangeObserver {
    pub fn new(delimiters: Delimiters, debounce: Duration) -> Self {
        Self {
            delimiters,
            debounce,
            armed: None,
            qualifying_batches: 0,
        }
    }

    /// Handle a batch of mutation records.
    ///
    /// Returns true if the batch qualified and the debounce timer was (re)armed.
    pub fn on_mutations<H: HostDocument>(
        &mut self,
        host: &mut H,
        mutations: &[Mutation<H::Node>],
    ) -> bool {
        if !self.qualifies(host, mutations) {
            return false;
        }
        self.qualifying_batches += 1;
        self.arm(host);
        true
    }

    /// Arm the debounce timer, replacing any pending one.
    pub fn arm<H: HostDocument>(&mut self, host: &mut H) {
        if let Some(previous) = self.armed.take() {
            host.clear_timeout(previous);
        }
        self.armed = Some(host.set_timeout(self.debounce));
    }

    /// A timer fired. True if it is the armed debounce timer, in which case a
    /// rescan is due.
    pub fn on_timer(&mut self, timer: TimerId) -> bool {
        if self.armed == Some(timer) {
            self.armed = None;
            true
        } else {
            tracing::trace!(target: "mathpatch::session", ?timer, "ignoring stale timer");
            false
        }
    }

    pub fn qualifying_batches(&self) -> u64 {
        self.qualifying_batches
    }

    fn qualifies<H: HostDocument>(&self, host: &H, mutations: &[Mutation<H::Node>]) -> bool {
        mutations.iter().any(|m| {
            m.affected().iter().any(|node| {
                host.text_content(node)
                    .is_some_and(|text| might_contain_math(&text, &self.delimiters))
            })
        })
    }
}
