//! Page-wide session and the single event dispatcher.
//!
//! Every browser callback (mutation observer, intersection observer, timers,
//! script load) funnels into [`dispatch`], which hands the event to the one
//! session stored for the page. Callbacks never run concurrently, but one could
//! in principle arrive while the session is busy; such events wait in a
//! backlog and are handled in the same drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use mathpatch_core::{Config, MathRenderer, Mutation, Session, SessionEvent};
use mathpatch_renderer::MathMlRenderer;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    MutationObserver, MutationObserverInit, MutationRecord,
};

use crate::error::HostError;
use crate::host::DomHost;
use crate::katex::{AutoRenderRenderer, KatexRenderer};
use crate::loader::load_katex;
use crate::node::DomNode;

pub type DomSession = Session<DomHost>;

thread_local! {
    static SESSION: RefCell<Option<DomSession>> = const { RefCell::new(None) };
    static BACKLOG: RefCell<VecDeque<SessionEvent<DomNode>>> = const { RefCell::new(VecDeque::new()) };
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Hand an event to the page session.
///
/// Events arriving before install, or after a failed install, are dropped.
pub fn dispatch(event: SessionEvent<DomNode>) {
    SESSION.with(|cell| {
        let Ok(mut guard) = cell.try_borrow_mut() else {
            BACKLOG.with(|backlog| backlog.borrow_mut().push_back(event));
            return;
        };
        let Some(session) = guard.as_mut() else {
            return;
        };

        enqueue(session, event);
        loop {
            session.run_until_idle();
            let Some(next) = BACKLOG.with(|backlog| backlog.borrow_mut().pop_front()) else {
                break;
            };
            enqueue(session, next);
        }
    });
}

fn enqueue(session: &mut DomSession, event: SessionEvent<DomNode>) {
    if let SessionEvent::TimerFired(timer) = &event {
        session.host_mut().release_timer(*timer);
    }
    session.enqueue(event);
}

/// Run `f` against the page session, if installed and not busy.
pub fn with_session<R>(f: impl FnOnce(&mut DomSession) -> R) -> Option<R> {
    SESSION.with(|cell| {
        let mut guard = cell.try_borrow_mut().ok()?;
        guard.as_mut().map(f)
    })
}

pub fn is_installed() -> bool {
    INSTALLED.with(Cell::get)
}

/// Install the pipeline on the current page.
///
/// Creates the session, starts observing the document and, if no JS
/// typesetter is present yet, injects KaTeX. The page only counts as
/// installed once the observers are wired, so a failed install can be
/// retried. Installing twice is a no-op.
pub fn install(config: Config) -> Result<(), HostError> {
    if is_installed() {
        tracing::debug!(target: "mathpatch::browser", "already installed");
        return Ok(());
    }
    config.validate()?;

    let window = web_sys::window().ok_or(HostError::NoWindow)?;
    let document = window.document().ok_or(HostError::NoDocument)?;
    let body = document.body().ok_or(HostError::NoBody)?;

    let intersection = intersection_observer(config.visibility_margin)?;
    let host = DomHost::new(window, document.clone(), &config, intersection);

    let mut providers: Vec<Box<dyn MathRenderer>> = vec![
        Box::new(KatexRenderer),
        Box::new(AutoRenderRenderer::new(document.clone())),
    ];
    // Probed before the MathML fallback joins: it is always available and
    // says nothing about whether KaTeX still has to be loaded.
    let typesetter_present = providers.iter().any(|p| p.is_available());
    if config.mathml_fallback {
        providers.push(Box::new(MathMlRenderer::new()));
    }

    let mut session = Session::new(host, &config, providers)?;
    let ready = session.is_ready();
    observe_mutations(&body)?;

    SESSION.with(|cell| *cell.borrow_mut() = Some(session));
    INSTALLED.with(|installed| installed.set(true));
    tracing::info!(
        target: "mathpatch::browser",
        selector = %config.selector,
        ready,
        typesetter_present,
        "installed"
    );

    dispatch(SessionEvent::Start);
    if !typesetter_present {
        if let Err(e) = load_katex(&document, &config) {
            dispatch(SessionEvent::CapabilityFailed(e.to_string()));
        }
    }
    Ok(())
}

fn intersection_observer(margin: f64) -> Result<IntersectionObserver, HostError> {
    let callback = Closure::wrap(Box::new(move |entries: js_sys::Array, _: IntersectionObserver| {
        for entry in entries.iter() {
            let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                continue;
            };
            if !entry.is_intersecting() {
                continue;
            }
            if let Some(node) = DomNode::existing(&entry.target()) {
                dispatch(SessionEvent::Intersected(node));
            }
        }
    }) as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>);

    let init = IntersectionObserverInit::new();
    init.set_root_margin(&format!("{margin}px"));
    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
    callback.forget();
    Ok(observer)
}

fn observe_mutations(body: &web_sys::HtmlElement) -> Result<(), HostError> {
    let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
        let mutations: Vec<Mutation<DomNode>> = records
            .iter()
            .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
            .filter_map(|record| to_mutation(&record))
            .collect();
        if !mutations.is_empty() {
            dispatch(SessionEvent::Mutations(mutations));
        }
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_character_data(true);
    init.set_subtree(true);
    observer.observe_with_options(body, &init)?;
    callback.forget();
    Ok(())
}

fn to_mutation(record: &MutationRecord) -> Option<Mutation<DomNode>> {
    let target = record.target()?;
    match record.type_().as_str() {
        "childList" => {
            let added = record.added_nodes();
            let added: Vec<DomNode> = (0..added.length())
                .filter_map(|i| added.item(i))
                .map(DomNode::transient)
                .collect();
            if added.is_empty() {
                return None;
            }
            Some(Mutation::ChildList {
                target: DomNode::transient(target),
                added,
            })
        }
        "characterData" => Some(Mutation::CharacterData {
            target: DomNode::transient(target),
        }),
        _ => None,
    }
}
