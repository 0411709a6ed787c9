//! Native math provider for mathpatch.
//!
//! Renders LaTeX to MathML with `pulldown-latex`, so it needs no script and
//! is always available. In the browser it is the last provider in the list,
//! enabled with `mathmlFallback`; native hosts use it directly.

pub mod math;

pub use math::{MathMlRenderer, render_math};
