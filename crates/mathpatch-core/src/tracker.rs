//! Processed-state markers.
//!
//! A node is marked once its content has been replaced and is never scanned
//! again, even if its text changes later. Marking happens before the content
//! is replaced: the replacement produces a mutation notification, and by the
//! time the observer sees it the node must already be marked or it would be
//! picked up again.

use crate::host::HostDocument;

#[derive(Debug, Default)]
pub struct ProcessedTracker {
    processed: u64,
}

impl ProcessedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed<H: HostDocument>(&self, host: &H, node: &H::Node) -> bool {
        host.has_marker(node)
    }

    /// Mark `node` and replace its content with `html`, in that order.
    pub fn commit<H: HostDocument>(&mut self, host: &mut H, node: &H::Node, html: &str) {
        host.set_marker(node);
        host.replace_html(node, html);
        self.processed += 1;
    }

    /// Nodes committed by this tracker.
    pub fn processed(&self) -> u64 {
        self.processed
    }
}
