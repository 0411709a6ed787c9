//! mathpatch-core: incremental inline-math rendering without a DOM dependency.
//!
//! This crate provides:
//! - `scan` - splitting text into literal and `$...$` math spans
//! - `RenderCache` - whole-text FIFO memoization of rendered HTML
//! - `RenderAdapter` / `MathRenderer` - provider probing with per-expression fallback
//! - `ProcessedTracker` - mark-before-replace bookkeeping
//! - `VisibilityScheduler` - eager vs. deferred processing by viewport distance
//! - `ChangeObserver` - mutation filtering with a debounced rescan timer
//! - `Session` - the page-lifetime pipeline, driven by queued `SessionEvent`s
//!
//! The page itself is abstracted by `HostDocument`; see `mathpatch-browser`
//! for the DOM implementation.

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod observer;
pub mod render;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use cache::RenderCache;
pub use config::Config;
pub use error::{ConfigError, RenderError};
pub use host::{HostDocument, Mutation, TimerId};
pub use observer::ChangeObserver;
pub use render::{MathRenderer, RenderAdapter, RenderOptions};
pub use scanner::{Delimiters, Span, SpanKind, has_math, might_contain_math, scan};
pub use scheduler::{Partition, VisibilityScheduler};
pub use session::{Session, SessionEvent, SessionStats};
pub use smol_str::SmolStr;
pub use tracker::ProcessedTracker;
