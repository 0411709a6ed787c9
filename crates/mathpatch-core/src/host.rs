//! Host document abstraction.
//!
//! The pipeline never touches a DOM directly. Everything it needs from the
//! page (enumerating candidates, reading and replacing content, markers,
//! visibility subscriptions, timers) goes through [`HostDocument`]. The browser
//! implementation lives in `mathpatch-browser`; tests use an in-memory fake.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

/// Handle for a timer armed through [`HostDocument::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u32);

/// A structural or text change reported by the host's mutation observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<N> {
    /// Children were added under `target`.
    ChildList { target: N, added: Vec<N> },
    /// The text of `target` changed in place.
    CharacterData { target: N },
}

impl<N> Mutation<N> {
    /// Nodes whose text should be checked for delimiters.
    pub fn affected(&self) -> &[N] {
        match self {
            Mutation::ChildList { added, .. } => added,
            Mutation::CharacterData { target } => std::slice::from_ref(target),
        }
    }
}

/// The page the pipeline runs against.
///
/// All calls happen from a single callback at a time; implementations do not
/// need interior synchronization.
pub trait HostDocument {
    /// Handle to a text-bearing element. Cheap to clone.
    type Node: Clone + Eq + Hash + Debug;

    /// Candidate elements in document order. May include already marked
    /// nodes; the pipeline filters those.
    fn candidates(&mut self) -> Vec<Self::Node>;

    /// Current rendered text of a node, `None` if the node is gone.
    fn text_content(&self, node: &Self::Node) -> Option<String>;

    /// Replace the node's content with HTML markup.
    fn replace_html(&mut self, node: &Self::Node, html: &str);

    fn has_marker(&self, node: &Self::Node) -> bool;

    fn set_marker(&mut self, node: &Self::Node);

    /// Whether the node lies within the viewport grown by `margin` on each side.
    fn is_near_viewport(&self, node: &Self::Node, margin: f64) -> bool;

    /// Subscribe to the first time the node intersects the viewport.
    fn observe_visibility(&mut self, node: &Self::Node);

    fn unobserve_visibility(&mut self, node: &Self::Node);

    fn set_timeout(&mut self, delay: Duration) -> TimerId;

    fn clear_timeout(&mut self, timer: TimerId);
}
