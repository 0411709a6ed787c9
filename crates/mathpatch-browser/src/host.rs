//! `HostDocument` over the live browser DOM.

use std::collections::HashMap;
use std::time::Duration;

use gloo_timers::callback::Timeout;
use mathpatch_core::{Config, HostDocument, SessionEvent, TimerId};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, IntersectionObserver, Node, Window};

use crate::node::DomNode;
use crate::runtime::dispatch;

pub struct DomHost {
    window: Window,
    document: Document,
    selector: String,
    /// Comma-joined ignored tags, for `Element::closest`.
    ignored: String,
    marker: String,
    intersection: IntersectionObserver,
    timers: HashMap<u32, Timeout>,
    /// Fired timers, kept until the next arm since their callback may still
    /// be on the stack when they are released.
    retired: Vec<Timeout>,
    next_timer: u32,
}

impl DomHost {
    pub fn new(
        window: Window,
        document: Document,
        config: &Config,
        intersection: IntersectionObserver,
    ) -> Self {
        Self {
            window,
            document,
            selector: config.selector.clone(),
            ignored: config.ignored_tags.join(", "),
            marker: config.marker_attribute.clone(),
            intersection,
            timers: HashMap::new(),
            retired: Vec::new(),
            next_timer: 0,
        }
    }

    /// Retire the handle of a timer that has fired.
    pub fn release_timer(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer.0) {
            self.retired.push(handle);
        }
    }

    /// Only plain text leaves are rewritten; anything with child elements
    /// belongs to the host's own rendering.
    fn is_text_leaf(element: &Element) -> bool {
        let children = element.child_nodes();
        children.length() == 1
            && children
                .item(0)
                .is_some_and(|child| child.node_type() == Node::TEXT_NODE)
    }

    fn is_ignored(&self, element: &Element) -> bool {
        if self.ignored.is_empty() {
            return false;
        }
        matches!(element.closest(&self.ignored), Ok(Some(_)))
    }
}

impl HostDocument for DomHost {
    type Node = DomNode;

    fn candidates(&mut self) -> Vec<DomNode> {
        let list = match self.document.query_selector_all(&self.selector) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(
                    target: "mathpatch::browser",
                    selector = %self.selector,
                    error = ?e,
                    "candidate query failed"
                );
                return Vec::new();
            }
        };

        let mut nodes = Vec::with_capacity(list.length() as usize);
        for i in 0..list.length() {
            let Some(element) = list.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                continue;
            };
            if element.has_attribute(&self.marker)
                || !Self::is_text_leaf(&element)
                || self.is_ignored(&element)
            {
                continue;
            }
            nodes.push(DomNode::for_element(&element));
        }
        nodes
    }

    fn text_content(&self, node: &DomNode) -> Option<String> {
        if !node.node().is_connected() {
            return None;
        }
        node.node().text_content()
    }

    fn replace_html(&mut self, node: &DomNode, html: &str) {
        if let Some(element) = node.element() {
            element.set_inner_html(html);
        }
    }

    fn has_marker(&self, node: &DomNode) -> bool {
        node.element()
            .is_some_and(|element| element.has_attribute(&self.marker))
    }

    fn set_marker(&mut self, node: &DomNode) {
        if let Some(element) = node.element() {
            if let Err(e) = element.set_attribute(&self.marker, "true") {
                tracing::warn!(target: "mathpatch::browser", error = ?e, "could not set marker");
            }
        }
    }

    fn is_near_viewport(&self, node: &DomNode, margin: f64) -> bool {
        let Some(element) = node.element() else {
            return false;
        };
        let rect = element.get_bounding_client_rect();
        let height = self
            .window
            .inner_height()
            .ok()
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0);
        rect.bottom() >= -margin && rect.top() <= height + margin
    }

    fn observe_visibility(&mut self, node: &DomNode) {
        if let Some(element) = node.element() {
            self.intersection.observe(element);
        }
    }

    fn unobserve_visibility(&mut self, node: &DomNode) {
        if let Some(element) = node.element() {
            self.intersection.unobserve(element);
        }
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.retired.clear();
        self.next_timer = self.next_timer.wrapping_add(1);
        let timer = TimerId(self.next_timer);
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let handle = Timeout::new(millis, move || {
            dispatch(SessionEvent::TimerFired(timer));
        });
        self.timers.insert(timer.0, handle);
        timer
    }

    fn clear_timeout(&mut self, timer: TimerId) {
        // Dropping a gloo Timeout cancels it.
        self.timers.remove(&timer.0);
    }
}
