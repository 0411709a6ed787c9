//! Browser DOM layer for mathpatch.
//!
//! Binds the pure pipeline in `mathpatch-core` to a live page: a
//! [`DomHost`] over the DOM, KaTeX providers, one-shot asset loading and the
//! observers that feed the page session. Assumes a `wasm32-unknown-unknown`
//! target environment.
//!
//! # Architecture
//!
//! - `host`: `HostDocument` over the DOM (queries, markers, timers)
//! - `node`: hashable node handles
//! - `katex`: `katex.renderToString` and auto-render providers
//! - `loader`: KaTeX stylesheet and script injection
//! - `runtime`: page session, event dispatch and install
//!
//! # Re-exports
//!
//! This crate re-exports `mathpatch-core` for convenience, so consumers
//! only need to depend on `mathpatch-browser`.

pub use mathpatch_core;
pub use mathpatch_core::*;

pub mod error;
pub mod host;
pub mod katex;
pub mod loader;
pub mod node;
pub mod runtime;

pub use error::HostError;
pub use host::DomHost;
pub use katex::{AutoRenderRenderer, KatexRenderer};
pub use loader::load_katex;
pub use node::{DomNode, NODE_ID_ATTRIBUTE};
pub use runtime::{DomSession, dispatch, install, is_installed, with_session};
