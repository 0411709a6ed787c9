//! Pipeline tests against an in-memory host document.
//!
//! `FakeDocument` stands in for the page: nodes have text, a vertical
//! position, and a marker flag; timers and visibility subscriptions are
//! recorded so tests can fire them by hand.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use crate::{
    Config, HostDocument, MathRenderer, Mutation, RenderError, RenderOptions, Session,
    SessionEvent, TimerId,
};

const VIEWPORT_HEIGHT: f64 = 800.0;

#[derive(Debug)]
struct FakeNode {
    text: String,
    html: Option<String>,
    marked: bool,
    top: f64,
    /// Removed from the page by the host.
    detached: bool,
}

#[derive(Debug, Default)]
struct FakeDocument {
    nodes: Vec<FakeNode>,
    next_timer: u32,
    live_timers: Vec<TimerId>,
    cleared_timers: Vec<TimerId>,
    observed: HashSet<usize>,
    /// Mutations our own rewrites caused, for feeding back into the session.
    feedback: Vec<Mutation<usize>>,
    replace_calls: usize,
}

impl FakeDocument {
    fn add(&mut self, text: &str, top: f64) -> usize {
        self.nodes.push(FakeNode {
            text: text.to_string(),
            html: None,
            marked: false,
            top,
            detached: false,
        });
        self.nodes.len() - 1
    }

    fn html(&self, node: usize) -> Option<&str> {
        self.nodes[node].html.as_deref()
    }

    fn detach(&mut self, node: usize) {
        self.nodes[node].detached = true;
    }

    fn set_text(&mut self, node: usize, text: &str) {
        self.nodes[node].text = text.to_string();
    }

    fn latest_timer(&self) -> TimerId {
        *self.live_timers.last().expect("no timer armed")
    }
}

impl HostDocument for FakeDocument {
    type Node = usize;

    fn candidates(&mut self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| !self.nodes[i].detached)
            .collect()
    }

    fn text_content(&self, node: &usize) -> Option<String> {
        self.nodes
            .get(*node)
            .filter(|n| !n.detached)
            .map(|n| n.text.clone())
    }

    fn replace_html(&mut self, node: &usize, html: &str) {
        let n = &mut self.nodes[*node];
        n.html = Some(html.to_string());
        // Good enough for the fake: the new text is the markup itself.
        n.text = html.to_string();
        self.replace_calls += 1;
        self.feedback.push(Mutation::ChildList {
            target: *node,
            added: vec![*node],
        });
    }

    fn has_marker(&self, node: &usize) -> bool {
        self.nodes[*node].marked
    }

    fn set_marker(&mut self, node: &usize) {
        self.nodes[*node].marked = true;
    }

    fn is_near_viewport(&self, node: &usize, margin: f64) -> bool {
        let top = self.nodes[*node].top;
        let bottom = top + 20.0;
        bottom >= -margin && top <= VIEWPORT_HEIGHT + margin
    }

    fn observe_visibility(&mut self, node: &usize) {
        self.observed.insert(*node);
    }

    fn unobserve_visibility(&mut self, node: &usize) {
        self.observed.remove(node);
    }

    fn set_timeout(&mut self, _delay: Duration) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        self.live_timers.push(id);
        id
    }

    fn clear_timeout(&mut self, timer: TimerId) {
        self.live_timers.retain(|t| *t != timer);
        self.cleared_timers.push(timer);
    }
}

/// Wraps expressions in `<M>` tags, rejects anything containing `\bad`.
struct StubRenderer {
    available: Rc<Cell<bool>>,
    calls: Rc<Cell<u32>>,
}

impl MathRenderer for StubRenderer {
    fn name(&self) -> &str {
        "stub"
    }

    fn is_available(&self) -> bool {
        self.available.get()
    }

    fn render_to_string(&self, expr: &str, _options: &RenderOptions) -> Result<String, RenderError> {
        self.calls.set(self.calls.get() + 1);
        if expr.contains(r"\bad") {
            return Err(RenderError::rejected("stub", "unknown macro"));
        }
        Ok(format!("<M>{expr}</M>"))
    }
}

struct Harness {
    session: Session<FakeDocument>,
    available: Rc<Cell<bool>>,
    calls: Rc<Cell<u32>>,
}

fn harness_with(doc: FakeDocument, config: Config, available: bool) -> Harness {
    let available = Rc::new(Cell::new(available));
    let calls = Rc::new(Cell::new(0));
    let renderer = StubRenderer {
        available: available.clone(),
        calls: calls.clone(),
    };
    let providers: Vec<Box<dyn MathRenderer>> = vec![Box::new(renderer)];
    let session = Session::new(doc, &config, providers).unwrap();
    Harness {
        session,
        available,
        calls,
    }
}

fn harness(doc: FakeDocument) -> Harness {
    harness_with(doc, Config::default(), true)
}

fn send(session: &mut Session<FakeDocument>, event: SessionEvent<usize>) {
    session.enqueue(event);
    session.run_until_idle();
}

#[test]
fn test_renders_inline_expression() {
    let mut doc = FakeDocument::default();
    let node = doc.add("A $x^2$ B", 0.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);

    assert_eq!(h.session.host().html(node), Some("A <M>x^2</M> B"));
    assert!(h.session.host().has_marker(&node));
    assert_eq!(h.calls.get(), 1);
}

#[test]
fn test_plain_and_unterminated_text_left_untouched() {
    let mut doc = FakeDocument::default();
    let plain = doc.add("no math here", 0.0);
    let open = doc.add("A $x", 10.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);

    for node in [plain, open] {
        assert_eq!(h.session.host().html(node), None);
        assert!(!h.session.host().has_marker(&node));
    }
    assert_eq!(h.session.host().replace_calls, 0);
    assert_eq!(h.calls.get(), 0);
}

#[test]
fn test_unterminated_text_scanned_once_across_passes() {
    let mut doc = FakeDocument::default();
    let open = doc.add("A $x", 0.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    for _ in 0..4 {
        h.session.run_pass();
    }

    let stats = h.session.stats();
    assert_eq!(stats.passes, 5);
    assert_eq!(stats.scans, 1);
    assert_eq!(stats.cache_len, 0);
    assert!(!h.session.host().has_marker(&open));

    // Once the expression is closed the new text is scanned and rendered.
    h.session.host_mut().set_text(open, "A $x$");
    h.session.run_pass();
    assert_eq!(h.session.host().html(open), Some("A <M>x</M>"));
    assert_eq!(h.session.stats().scans, 2);
}

#[test]
fn test_processing_twice_is_a_no_op() {
    let mut doc = FakeDocument::default();
    let node = doc.add("energy $E=mc^2$", 0.0);
    let mut h = harness(doc);

    assert!(h.session.process_node(&node));
    let after_first = h.session.stats();

    assert!(!h.session.process_node(&node));
    let after_second = h.session.stats();

    assert_eq!(after_first.scans, 1);
    assert_eq!(after_second.scans, 1);
    assert_eq!(after_second.render_calls, after_first.render_calls);
    assert_eq!(h.calls.get(), 1);
}

#[test]
fn test_identical_text_renders_once() {
    let mut doc = FakeDocument::default();
    let first = doc.add("same $a+b$ text", 0.0);
    let second = doc.add("same $a+b$ text", 40.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);

    assert_eq!(h.calls.get(), 1);
    assert_eq!(h.session.stats().cache_hits, 1);
    assert_eq!(h.session.host().html(first), h.session.host().html(second));
    assert!(h.session.host().has_marker(&second));
}

#[test]
fn test_cache_evicts_first_inserted_text() {
    let config = Config {
        cache_capacity: 2,
        ..Default::default()
    };
    let mut h = harness_with(FakeDocument::default(), config, true);

    h.session.render_text("$a$").unwrap();
    h.session.render_text("$b$").unwrap();
    h.session.render_text("$c$").unwrap();
    assert_eq!(h.calls.get(), 3);

    // "$b$" is still cached, "$a$" was evicted and renders again.
    h.session.render_text("$b$").unwrap();
    assert_eq!(h.calls.get(), 3);
    h.session.render_text("$a$").unwrap();
    assert_eq!(h.calls.get(), 4);
}

#[test]
fn test_far_node_waits_for_intersection() {
    let mut doc = FakeDocument::default();
    let near = doc.add("near $n$", 100.0);
    let far = doc.add("far $f$", 5000.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);

    assert!(h.session.host().has_marker(&near));
    assert!(!h.session.host().has_marker(&far));
    assert!(h.session.host().observed.contains(&far));
    assert_eq!(h.session.stats().pending_subscriptions, 1);

    send(&mut h.session, SessionEvent::Intersected(far));
    assert_eq!(h.session.host().html(far), Some("far <M>f</M>"));
    assert!(!h.session.host().observed.contains(&far));

    // A second intersection for the same node does nothing.
    send(&mut h.session, SessionEvent::Intersected(far));
    let stats = h.session.stats();
    assert_eq!(stats.nodes_processed, 2);
    assert_eq!(stats.intersections, 1);
    assert_eq!(stats.pending_subscriptions, 0);
}

#[test]
fn test_deferred_node_not_subscribed_twice() {
    let mut doc = FakeDocument::default();
    let far = doc.add("far $f$", 5000.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    h.session.run_pass();

    let stats = h.session.stats();
    assert_eq!(stats.deferred, 1);
    assert_eq!(stats.pending_subscriptions, 1);
    assert!(!h.session.host().has_marker(&far));
}

#[test]
fn test_deferred_node_scrolled_near_is_processed_on_next_pass() {
    let mut doc = FakeDocument::default();
    let far = doc.add("far $f$", 5000.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    h.session.host_mut().nodes[far].top = 300.0;
    h.session.run_pass();

    assert!(h.session.host().has_marker(&far));
    assert!(!h.session.host().observed.contains(&far));
    assert_eq!(h.session.stats().pending_subscriptions, 0);

    // The late intersection finds nothing to do.
    send(&mut h.session, SessionEvent::Intersected(far));
    assert_eq!(h.session.stats().intersections, 0);
    assert_eq!(h.session.host().replace_calls, 1);
}

#[test]
fn test_removed_deferred_nodes_release_subscriptions() {
    let mut doc = FakeDocument::default();
    let far: Vec<usize> = (0..50)
        .map(|i| doc.add(&format!("far $f_{i}$"), 5000.0 + i as f64 * 40.0))
        .collect();
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    assert_eq!(h.session.stats().pending_subscriptions, 50);
    assert_eq!(h.session.host().observed.len(), 50);

    for &node in &far {
        h.session.host_mut().detach(node);
    }
    for _ in 0..5 {
        h.session.run_pass();
    }

    assert_eq!(h.session.stats().pending_subscriptions, 0);
    assert!(h.session.host().observed.is_empty());
    assert_eq!(h.session.stats().deferred, 50);
}

#[test]
fn test_deferred_node_losing_math_is_unsubscribed() {
    let mut doc = FakeDocument::default();
    let kept = doc.add("far $k$", 5000.0);
    let edited = doc.add("far $e$", 6000.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    h.session.host_mut().set_text(edited, "no longer math");
    h.session.run_pass();

    assert_eq!(h.session.stats().pending_subscriptions, 1);
    assert!(h.session.host().observed.contains(&kept));
    assert!(!h.session.host().observed.contains(&edited));

    // Its intersection, if one was already queued, is ignored.
    send(&mut h.session, SessionEvent::Intersected(edited));
    assert_eq!(h.session.stats().intersections, 0);
}

#[test]
fn test_mutation_burst_coalesces_into_one_pass() {
    let mut doc = FakeDocument::default();
    let node = doc.add("streaming", 0.0);
    let mut h = harness(doc);
    send(&mut h.session, SessionEvent::Start);
    let passes_before = h.session.stats().passes;

    let mut text = String::from("streaming $x");
    for i in 0..50 {
        text.push_str(if i == 49 { "$" } else { "+" });
        h.session.host_mut().set_text(node, &text);
        send(
            &mut h.session,
            SessionEvent::Mutations(vec![Mutation::CharacterData { target: node }]),
        );
    }

    assert_eq!(h.session.host().live_timers.len(), 1);
    assert_eq!(h.session.host().cleared_timers.len(), 49);

    // Stale timers that slipped through are ignored.
    for stale in h.session.host().cleared_timers.clone() {
        send(&mut h.session, SessionEvent::TimerFired(stale));
    }
    assert_eq!(h.session.stats().passes, passes_before);

    let timer = h.session.host().latest_timer();
    send(&mut h.session, SessionEvent::TimerFired(timer));

    assert_eq!(h.session.stats().passes, passes_before + 1);
    assert!(h.session.host().has_marker(&node));
    assert_eq!(h.calls.get(), 1);
}

#[test]
fn test_mutations_without_delimiter_do_not_arm() {
    let mut doc = FakeDocument::default();
    let node = doc.add("plain words", 0.0);
    let mut h = harness(doc);

    send(
        &mut h.session,
        SessionEvent::Mutations(vec![Mutation::ChildList {
            target: node,
            added: vec![node],
        }]),
    );

    assert!(h.session.host().live_timers.is_empty());
}

#[test]
fn test_own_rewrite_does_not_cause_reprocessing() {
    let mut doc = FakeDocument::default();
    let node = doc.add(r"broken $\bad$ and $y$", 0.0);
    let mut h = harness(doc);

    send(&mut h.session, SessionEvent::Start);
    assert_eq!(
        h.session.host().html(node),
        Some(r"broken $\bad$ and <M>y</M>")
    );

    // The fallback text still contains delimiters, so the feedback qualifies
    // and arms a rescan, but the marked node is skipped.
    let feedback = std::mem::take(&mut h.session.host_mut().feedback);
    send(&mut h.session, SessionEvent::Mutations(feedback));
    let timer = h.session.host().latest_timer();
    send(&mut h.session, SessionEvent::TimerFired(timer));

    assert_eq!(h.session.host().replace_calls, 1);
    assert!(h.session.host().feedback.is_empty());
    assert_eq!(h.calls.get(), 2);
}

#[test]
fn test_processed_node_not_rescanned_after_text_change() {
    let mut doc = FakeDocument::default();
    let node = doc.add("$a$", 0.0);
    let mut h = harness(doc);
    send(&mut h.session, SessionEvent::Start);

    h.session.host_mut().set_text(node, "$a$ edited $b$");
    send(
        &mut h.session,
        SessionEvent::Mutations(vec![Mutation::CharacterData { target: node }]),
    );
    let timer = h.session.host().latest_timer();
    send(&mut h.session, SessionEvent::TimerFired(timer));

    assert_eq!(h.session.host().html(node), Some("<M>a</M>"));
    assert_eq!(h.calls.get(), 1);
}

#[test]
fn test_nothing_marked_until_provider_loads() {
    let mut doc = FakeDocument::default();
    let node = doc.add("wait $w$", 0.0);
    let mut h = harness_with(doc, Config::default(), false);

    send(&mut h.session, SessionEvent::Start);
    send(
        &mut h.session,
        SessionEvent::Mutations(vec![Mutation::CharacterData { target: node }]),
    );
    let timer = h.session.host().latest_timer();
    send(&mut h.session, SessionEvent::TimerFired(timer));

    assert!(!h.session.host().has_marker(&node));
    assert_eq!(h.session.stats().passes, 0);
    assert!(h.session.render_text("$w$").is_none());

    h.available.set(true);
    send(&mut h.session, SessionEvent::CapabilityLoaded);

    assert_eq!(h.session.host().html(node), Some("wait <M>w</M>"));
}

#[test]
fn test_load_failure_leaves_page_readable() {
    let mut doc = FakeDocument::default();
    let node = doc.add("never $rendered$", 0.0);
    let mut h = harness_with(doc, Config::default(), false);

    send(&mut h.session, SessionEvent::Start);
    send(
        &mut h.session,
        SessionEvent::CapabilityFailed("script error".into()),
    );

    assert!(h.session.load_failed());
    assert_eq!(h.session.host().html(node), None);
    assert!(!h.session.host().has_marker(&node));
    assert_eq!(h.calls.get(), 0);
}

#[test]
fn test_literal_text_is_escaped() {
    let mut h = harness(FakeDocument::default());
    let html = h.session.render_text("a < b & $x$").unwrap();
    assert_eq!(html, "a &lt; b &amp; <M>x</M>");
}

#[test]
fn test_render_text_without_math() {
    let mut h = harness(FakeDocument::default());
    assert!(h.session.render_text("nothing to see").is_none());
    assert!(h.session.render_text("open $only").is_none());
    assert_eq!(h.calls.get(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let config = Config {
        cache_capacity: 0,
        ..Default::default()
    };
    let result = Session::new(FakeDocument::default(), &config, Vec::new());
    assert!(result.is_err());
}
