//! Hashable handles for DOM nodes.
//!
//! `web_sys::Node` has no identity-based `Hash`, so the pipeline works with
//! [`DomNode`]: the node plus a numeric id. Candidate elements keep their id in
//! a data attribute so the element reported by an intersection callback maps
//! back to the same handle the scheduler subscribed. Nodes that only appear in
//! mutation records get a fresh id and are never stored.

use std::cell::Cell;
use std::hash::{Hash, Hasher};

use wasm_bindgen::JsCast;
use web_sys::{Element, Node};

/// Attribute carrying a candidate element's id.
pub const NODE_ID_ATTRIBUTE: &str = "data-mathpatch-node";

thread_local! {
    static NEXT_NODE_ID: Cell<u32> = const { Cell::new(1) };
}

fn next_node_id() -> u32 {
    NEXT_NODE_ID.with(|next| {
        let id = next.get();
        next.set(id.wrapping_add(1));
        id
    })
}

#[derive(Clone, Debug)]
pub struct DomNode {
    id: u32,
    node: Node,
}

impl DomNode {
    /// Handle for a candidate element, assigning an id on first sight.
    pub fn for_element(element: &Element) -> Self {
        let id = match Self::element_id(element) {
            Some(id) => id,
            None => {
                let id = next_node_id();
                let _ = element.set_attribute(NODE_ID_ATTRIBUTE, &id.to_string());
                id
            }
        };
        Self {
            id,
            node: element.clone().unchecked_into(),
        }
    }

    /// Handle for an element that already has an id. Used for intersection
    /// callbacks, where an element without an id was never subscribed.
    pub fn existing(element: &Element) -> Option<Self> {
        Self::element_id(element).map(|id| Self {
            id,
            node: element.clone().unchecked_into(),
        })
    }

    /// Throwaway handle for a node seen in a mutation record.
    pub fn transient(node: Node) -> Self {
        Self {
            id: next_node_id(),
            node,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn element(&self) -> Option<&Element> {
        self.node.dyn_ref::<Element>()
    }

    fn element_id(element: &Element) -> Option<u32> {
        element
            .get_attribute(NODE_ID_ATTRIBUTE)
            .and_then(|raw| raw.parse().ok())
    }
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DomNode {}

impl Hash for DomNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
