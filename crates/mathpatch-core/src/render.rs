//! Boundary to the external math typesetter.
//!
//! Providers implement [`MathRenderer`]. The [`RenderAdapter`] probes an ordered
//! list of providers, binds the highest-ranked one that reports itself
//! available, and isolates per-expression failures: a rejected expression
//! comes back as its original delimited text so the page stays readable.

use pulldown_cmark_escape::escape_html;

use crate::error::RenderError;
use crate::scanner::Delimiters;

/// Options passed to a provider for one expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    /// Block layout. Always false for spans produced by the scanner.
    pub display_mode: bool,
    /// Ask the provider to report errors instead of rendering error markup.
    pub throw_on_error: bool,
}

impl RenderOptions {
    pub fn inline() -> Self {
        Self {
            display_mode: false,
            throw_on_error: true,
        }
    }
}

/// A math typesetting capability.
pub trait MathRenderer {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether the capability can render right now. Providers backed by a
    /// script loaded over the network report false until it has loaded.
    fn is_available(&self) -> bool;

    /// Render one expression (without delimiters) to HTML markup.
    fn render_to_string(&self, expr: &str, options: &RenderOptions) -> Result<String, RenderError>;
}

/// Ordered provider list with one provider bound for the session.
pub struct RenderAdapter {
    providers: Vec<Box<dyn MathRenderer>>,
    bound: Option<usize>,
    delimiters: Delimiters,
    render_calls: u64,
    failures: u64,
}

impl RenderAdapter {
    pub fn new(providers: Vec<Box<dyn MathRenderer>>, delimiters: Delimiters) -> Self {
        Self {
            providers,
            bound: None,
            delimiters,
            render_calls: 0,
            failures: 0,
        }
    }

    /// Bind the highest-ranked available provider.
    ///
    /// Returns false until some provider reports itself available. A bound
    /// provider stays bound unless one ranked above it becomes available, so
    /// an always-available fallback gives way once the page's typesetter has
    /// loaded.
    pub fn available(&mut self) -> bool {
        let ranked_above = self.bound.unwrap_or(self.providers.len());
        if let Some(index) = self.providers[..ranked_above]
            .iter()
            .position(|p| p.is_available())
        {
            match self.bound.replace(index) {
                Some(previous) => tracing::info!(
                    target: "mathpatch::render",
                    provider = self.providers[index].name(),
                    replaced = self.providers[previous].name(),
                    "math provider rebound"
                ),
                None => tracing::info!(
                    target: "mathpatch::render",
                    provider = self.providers[index].name(),
                    "math provider bound"
                ),
            }
        }
        self.bound.is_some()
    }

    /// Name of the bound provider, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.bound.map(|i| self.providers[i].name())
    }

    /// Render one expression. Never fails: on any error the expression comes
    /// back HTML-escaped inside its original delimiters.
    pub fn render_expression(&mut self, expr: &str, options: &RenderOptions) -> String {
        let result = match self.bound {
            Some(index) => {
                self.render_calls += 1;
                self.providers[index].render_to_string(expr, options)
            }
            None => Err(RenderError::Unavailable),
        };

        match result {
            Ok(html) => html,
            Err(e) => {
                self.failures += 1;
                tracing::debug!(
                    target: "mathpatch::render",
                    expr = %expr.escape_debug(),
                    error = %e,
                    "render failed, keeping source text"
                );
                self.fallback(expr)
            }
        }
    }

    /// Number of calls made into the bound provider.
    pub fn render_calls(&self) -> u64 {
        self.render_calls
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn fallback(&self, expr: &str) -> String {
        let mut escaped = String::new();
        // Writing to a String can't fail.
        let _ = escape_html(&mut escaped, &self.delimiters.wrap(expr));
        escaped
    }
}

impl std::fmt::Debug for RenderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderAdapter")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("bound", &self.bound)
            .field("render_calls", &self.render_calls)
            .finish()
    }
}
