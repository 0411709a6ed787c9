//! One-shot KaTeX asset injection.
//!
//! Appends the KaTeX stylesheet and script to `<head>`. The script's `load`
//! event becomes `CapabilityLoaded`, its `error` event `CapabilityFailed`.
//! There is no retry: a failed load leaves the page as it was.

use gloo_events::EventListener;
use mathpatch_core::{Config, SessionEvent};
use web_sys::{Document, Element};

use crate::error::HostError;
use crate::runtime::dispatch;

fn asset_parent(document: &Document) -> Result<Element, HostError> {
    if let Some(head) = document.head() {
        return Ok(head.into());
    }
    document.document_element().ok_or(HostError::NoDocument)
}

/// Inject the KaTeX stylesheet and script.
pub fn load_katex(document: &Document, config: &Config) -> Result<(), HostError> {
    let parent = asset_parent(document)?;

    let link = document.create_element("link")?;
    link.set_attribute("rel", "stylesheet")?;
    link.set_attribute("href", &config.katex_stylesheet_url)?;
    parent.append_child(&link)?;

    let script = document.create_element("script")?;
    script.set_attribute("src", &config.katex_script_url)?;
    script.set_attribute("async", "")?;

    let url = config.katex_script_url.clone();
    EventListener::once(&script, "load", move |_| {
        tracing::info!(target: "mathpatch::browser", %url, "KaTeX loaded");
        dispatch(SessionEvent::CapabilityLoaded);
    })
    .forget();

    let url = config.katex_script_url.clone();
    EventListener::once(&script, "error", move |_| {
        dispatch(SessionEvent::CapabilityFailed(format!("could not load {url}")));
    })
    .forget();

    parent.append_child(&script)?;
    tracing::debug!(
        target: "mathpatch::browser",
        script = %config.katex_script_url,
        stylesheet = %config.katex_stylesheet_url,
        "injected KaTeX assets"
    );
    Ok(())
}
