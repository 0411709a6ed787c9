use miette::Diagnostic;
use thiserror::Error;

/// Failure of a single expression inside a math provider.
///
/// Never escapes the render adapter: it is turned into the delimited fallback
/// text there.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum RenderError {
    #[error("{provider} rejected expression: {message}")]
    #[diagnostic(code(mathpatch::render::rejected))]
    Rejected { provider: String, message: String },

    #[error("no math provider is available")]
    #[diagnostic(code(mathpatch::render::unavailable))]
    Unavailable,
}

impl RenderError {
    pub fn rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cache capacity must be at least 1")]
    #[diagnostic(code(mathpatch::config::zero_capacity))]
    ZeroCapacity,

    #[error("delimiter and escape character are both {0:?}")]
    #[diagnostic(
        code(mathpatch::config::conflicting_delimiters),
        help("pick an escape character different from the delimiter")
    )]
    ConflictingDelimiters(char),

    #[error("candidate selector is empty")]
    #[diagnostic(code(mathpatch::config::invalid_selector))]
    InvalidSelector,

    #[error("marker attribute {0:?} is not a valid attribute name")]
    #[diagnostic(code(mathpatch::config::invalid_marker))]
    InvalidMarker(String),
}
