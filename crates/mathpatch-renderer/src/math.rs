//! LaTeX to MathML through pulldown-latex.

use mathpatch_core::{MathRenderer, RenderError, RenderOptions};
use pulldown_cmark_escape::escape_html;
use pulldown_latex::{
    Parser, Storage, config::DisplayMode, config::RenderConfig, mathml::push_mathml,
};

const PROVIDER: &str = "mathml";

fn display_mode(block: bool) -> DisplayMode {
    if block {
        DisplayMode::Block
    } else {
        DisplayMode::Inline
    }
}

/// Render one expression (without delimiters) to a `<math>` element.
///
/// Parse errors are collected from the whole expression and reported
/// together.
pub fn render_math(latex: &str, block: bool) -> Result<String, RenderError> {
    let storage = Storage::new();
    let events: Vec<_> = Parser::new(latex, &storage).collect();

    let problems: Vec<String> = events
        .iter()
        .filter_map(|event| event.as_ref().err().map(ToString::to_string))
        .collect();
    if !problems.is_empty() {
        return Err(RenderError::rejected(PROVIDER, problems.join("; ")));
    }

    let config = RenderConfig {
        display_mode: display_mode(block),
        ..Default::default()
    };
    let mut mathml = String::new();
    push_mathml(&mut mathml, events.into_iter(), config)
        .map_err(|e| RenderError::rejected(PROVIDER, e.to_string()))?;
    Ok(mathml)
}

/// MathML's own error element wrapping the source, for lenient rendering.
fn merror(latex: &str, message: &str, block: bool) -> String {
    let display = if block { "block" } else { "inline" };
    let mut source = String::new();
    let mut title = String::new();
    let _ = escape_html(&mut source, latex);
    let _ = escape_html(&mut title, message);
    format!(
        r#"<math display="{display}"><merror title="{title}"><mtext>{source}</mtext></merror></math>"#
    )
}

/// `MathRenderer` provider backed by [`render_math`]. Always available.
///
/// With `throw_on_error` unset, an invalid expression renders as `<merror>`
/// instead of failing, the way KaTeX renders its error markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlRenderer;

impl MathMlRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl MathRenderer for MathMlRenderer {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        true
    }

    fn render_to_string(&self, expr: &str, options: &RenderOptions) -> Result<String, RenderError> {
        match render_math(expr, options.display_mode) {
            Ok(mathml) => Ok(mathml),
            Err(e) if options.throw_on_error => Err(e),
            Err(RenderError::Rejected { message, .. }) => {
                tracing::trace!(target: "mathpatch::render", %message, "rendering mathml error markup");
                Ok(merror(expr, &message, options.display_mode))
            }
            Err(e) => Err(e),
        }
    }
}
