//! The page-lifetime pipeline session and its event dispatcher.
//!
//! A [`Session`] owns every piece of mutable pipeline state: the render cache,
//! the bound provider, pending visibility subscriptions and the debounce
//! timer. Host callbacks never touch that state directly; they turn into
//! [`SessionEvent`]s, which are queued and handled one at a time. Because
//! handling takes `&mut self`, a pass can never observe another pass halfway
//! through, and marking a node always completes before the mutation it causes
//! is looked at.

use std::collections::VecDeque;

use pulldown_cmark_escape::escape_html;
use serde::Serialize;
use web_time::Instant;

use crate::cache::RenderCache;
use crate::config::Config;
use crate::error::ConfigError;
use crate::host::{HostDocument, Mutation, TimerId};
use crate::observer::ChangeObserver;
use crate::render::{MathRenderer, RenderAdapter, RenderOptions};
use crate::scanner::{Delimiters, SpanKind, has_math, might_contain_math, scan};
use crate::scheduler::VisibilityScheduler;
use crate::tracker::ProcessedTracker;

/// Something the host reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent<N> {
    /// The session was installed on the page.
    Start,
    /// The external typesetter finished loading.
    CapabilityLoaded,
    /// The external typesetter could not be loaded.
    CapabilityFailed(String),
    Mutations(Vec<Mutation<N>>),
    TimerFired(TimerId),
    /// A deferred node entered the viewport.
    Intersected(N),
}

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub passes: u64,
    pub scans: u64,
    pub render_calls: u64,
    pub render_failures: u64,
    pub cache_hits: u64,
    pub cache_len: usize,
    pub nodes_processed: u64,
    pub deferred: u64,
    pub pending_subscriptions: usize,
    pub intersections: u64,
}

pub struct Session<H: HostDocument> {
    host: H,
    delimiters: Delimiters,
    cache: RenderCache,
    /// Texts already scanned and found without a complete expression.
    skipped: RenderCache<()>,
    adapter: RenderAdapter,
    tracker: ProcessedTracker,
    scheduler: VisibilityScheduler<H::Node>,
    observer: ChangeObserver,
    queue: VecDeque<SessionEvent<H::Node>>,
    load_failed: bool,
    passes: u64,
    scans: u64,
    deferred: u64,
    intersections: u64,
}

impl<H: HostDocument> Session<H> {
    /// Create a session over `host`, probing `providers` in order.
    pub fn new(
        host: H,
        config: &Config,
        providers: Vec<Box<dyn MathRenderer>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let delimiters = config.delimiters();
        Ok(Self {
            host,
            delimiters,
            cache: RenderCache::new(config.cache_capacity),
            skipped: RenderCache::new(config.cache_capacity),
            adapter: RenderAdapter::new(providers, delimiters),
            tracker: ProcessedTracker::new(),
            scheduler: VisibilityScheduler::new(config.visibility_margin),
            observer: ChangeObserver::new(delimiters, config.debounce()),
            queue: VecDeque::new(),
            load_failed: false,
            passes: 0,
            scans: 0,
            deferred: 0,
            intersections: 0,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Whether a provider is bound and rendering can happen.
    pub fn is_ready(&mut self) -> bool {
        self.adapter.available()
    }

    /// True once the typesetter load has failed for good.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn enqueue(&mut self, event: SessionEvent<H::Node>) {
        self.queue.push_back(event);
    }

    /// Handle queued events in arrival order until the queue is empty.
    ///
    /// Returns the number of events handled.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.pop_front() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Handle a single event.
    pub fn handle(&mut self, event: SessionEvent<H::Node>) {
        match event {
            SessionEvent::Start | SessionEvent::CapabilityLoaded => {
                if self.adapter.available() {
                    self.run_pass();
                } else {
                    tracing::debug!(
                        target: "mathpatch::session",
                        "no math provider available yet, waiting for load"
                    );
                }
            }
            SessionEvent::CapabilityFailed(reason) => {
                self.load_failed = true;
                tracing::warn!(
                    target: "mathpatch::session",
                    %reason,
                    "math provider failed to load, leaving text as is"
                );
            }
            SessionEvent::Mutations(mutations) => {
                if self.observer.on_mutations(&mut self.host, &mutations) {
                    tracing::trace!(
                        target: "mathpatch::session",
                        records = mutations.len(),
                        "qualifying mutations, rescan re-armed"
                    );
                }
            }
            SessionEvent::TimerFired(timer) => {
                if self.observer.on_timer(timer) {
                    if self.adapter.available() {
                        self.run_pass();
                    } else {
                        tracing::debug!(
                            target: "mathpatch::session",
                            "rescan skipped, no math provider available"
                        );
                    }
                }
            }
            SessionEvent::Intersected(node) => {
                if self.scheduler.take_intersection(&mut self.host, &node) {
                    self.intersections += 1;
                    self.process_node(&node);
                }
            }
        }
    }

    /// One full pass over the current unprocessed candidates.
    ///
    /// Returns the number of nodes rewritten right away.
    pub fn run_pass(&mut self) -> usize {
        if !self.adapter.available() {
            return 0;
        }
        let started = Instant::now();
        self.passes += 1;

        let candidates: Vec<H::Node> = self
            .host
            .candidates()
            .into_iter()
            .filter(|node| !self.tracker.is_processed(&self.host, node))
            .filter(|node| {
                self.host
                    .text_content(node)
                    .is_some_and(|text| might_contain_math(&text, &self.delimiters))
            })
            .collect();

        let dropped = self.scheduler.retain_candidates(&mut self.host, &candidates);
        let partition = self.scheduler.partition(&mut self.host, candidates);
        self.deferred += partition.deferred.len() as u64;

        let mut rewritten = 0;
        for node in &partition.immediate {
            if self.process_node(node) {
                rewritten += 1;
            }
        }

        tracing::debug!(
            target: "mathpatch::session",
            pass = self.passes,
            immediate = partition.immediate.len(),
            deferred = partition.deferred.len(),
            rewritten,
            dropped,
            elapsed_us = started.elapsed().as_micros() as u64,
            "pass complete"
        );
        rewritten
    }

    /// Render a single node if it has not been processed yet.
    ///
    /// Returns true if the node's content was replaced. Nodes without a
    /// complete inline expression are left untouched and unmarked.
    pub fn process_node(&mut self, node: &H::Node) -> bool {
        if !self.adapter.available() || self.tracker.is_processed(&self.host, node) {
            return false;
        }
        let Some(text) = self.host.text_content(node) else {
            return false;
        };
        let Some(html) = self.render_cached(&text) else {
            return false;
        };
        self.tracker.commit(&mut self.host, node, &html);
        true
    }

    /// Render arbitrary text through the same cache and provider, without
    /// touching the document. `None` if the text holds no inline math.
    pub fn render_text(&mut self, text: &str) -> Option<String> {
        if !self.adapter.available() {
            return None;
        }
        self.render_cached(text)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            passes: self.passes,
            scans: self.scans,
            render_calls: self.adapter.render_calls(),
            render_failures: self.adapter.failures(),
            cache_hits: self.cache.hits(),
            cache_len: self.cache.len(),
            nodes_processed: self.tracker.processed(),
            deferred: self.deferred,
            pending_subscriptions: self.scheduler.pending(),
            intersections: self.intersections,
        }
    }

    /// Whole-text cache lookup, falling back to scan and render.
    fn render_cached(&mut self, text: &str) -> Option<String> {
        if !might_contain_math(text, &self.delimiters) {
            return None;
        }
        if let Some(html) = self.cache.get(text) {
            return Some(html.to_owned());
        }
        if self.skipped.contains(text) {
            return None;
        }

        self.scans += 1;
        let spans = scan(text, &self.delimiters);
        if !has_math(&spans) {
            self.skipped.put(text, ());
            return None;
        }

        let options = RenderOptions::inline();
        let mut html = String::with_capacity(text.len() * 2);
        for span in &spans {
            match span.kind {
                SpanKind::Literal => {
                    let _ = escape_html(&mut html, &span.text);
                }
                SpanKind::Math => {
                    html.push_str(&self.adapter.render_expression(&span.text, &options));
                }
            }
        }

        self.cache.put(text, html.clone());
        Some(html)
    }
}

impl<H: HostDocument + std::fmt::Debug> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("adapter", &self.adapter)
            .field("queued", &self.queue.len())
            .field("stats", &self.stats())
            .finish()
    }
}
