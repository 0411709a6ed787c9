//! Inline math delimiter scanning.
//!
//! Splits plain text into literal and math spans using the single-delimiter
//! inline convention (`$...$`). Double-delimiter display regions (`$$...$$`)
//! are left as literal text; the scanner never produces display math.
//!
//! The scanner is pure: no rendering, no escaping. Callers decide what to do
//! with the spans, and must leave the source untouched when [`has_math`]
//! reports nothing to render.

use std::ops::Range;

use smol_str::SmolStr;

/// Delimiter convention used by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Character opening and closing an inline expression.
    pub delimiter: char,
    /// Character that, placed immediately before a delimiter, makes it literal.
    pub escape: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            delimiter: '$',
            escape: '\\',
        }
    }
}

impl Delimiters {
    /// Wrap an expression back into its delimiters, e.g. `x^2` -> `$x^2$`.
    pub fn wrap(&self, expr: &str) -> String {
        let mut out = String::with_capacity(expr.len() + 2 * self.delimiter.len_utf8());
        out.push(self.delimiter);
        out.push_str(expr);
        out.push(self.delimiter);
        out
    }
}

/// Whether a span is passed through or rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Literal,
    Math,
}

/// A contiguous piece of scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    /// Raw text for literals, delimiter-stripped expression for math.
    pub text: SmolStr,
    /// Byte range in the scanned text. Math spans include both delimiters.
    pub source: Range<usize>,
}

impl Span {
    fn literal(text: &str, source: Range<usize>) -> Self {
        Self {
            kind: SpanKind::Literal,
            text: SmolStr::new(&text[source.clone()]),
            source,
        }
    }

    fn math(expr: &str, source: Range<usize>) -> Self {
        Self {
            kind: SpanKind::Math,
            text: SmolStr::new(expr),
            source,
        }
    }

    pub fn is_math(&self) -> bool {
        self.kind == SpanKind::Math
    }
}

/// Cheap prefilter: can this text contain an inline expression at all?
pub fn might_contain_math(text: &str, delimiters: &Delimiters) -> bool {
    text.contains(delimiters.delimiter)
}

/// True if any span is math. A scan without math means "leave the text alone".
pub fn has_math(spans: &[Span]) -> bool {
    spans.iter().any(Span::is_math)
}

/// Split `text` into ordered literal and math spans.
///
/// The `source` ranges of the returned spans cover `text` exactly once, in
/// order. An opening delimiter without a closer turns itself and the rest of
/// the text into one trailing literal span.
pub fn scan(text: &str, delimiters: &Delimiters) -> Vec<Span> {
    let delim_len = delimiters.delimiter.len_utf8();
    let mut spans = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(open) = find_unescaped(text, pos, delimiters) {
        let after_open = open + delim_len;

        if text[after_open..].starts_with(delimiters.delimiter) {
            // Display region: stays literal, including its closing pair.
            let body = after_open + delim_len;
            pos = match find_double(text, body, delimiters) {
                Some(close) => close + 2 * delim_len,
                None => body,
            };
            continue;
        }

        let Some(close) = find_unescaped(text, after_open, delimiters) else {
            push_literal(&mut spans, text, literal_start..open);
            spans.push(Span::literal(text, open..text.len()));
            tracing::trace!(
                target: "mathpatch::scan",
                offset = open,
                "unterminated inline expression left as literal"
            );
            return spans;
        };

        push_literal(&mut spans, text, literal_start..open);
        spans.push(Span::math(&text[after_open..close], open..close + delim_len));
        pos = close + delim_len;
        literal_start = pos;
    }

    push_literal(&mut spans, text, literal_start..text.len());
    spans
}

fn push_literal(spans: &mut Vec<Span>, text: &str, range: Range<usize>) {
    if !range.is_empty() {
        spans.push(Span::literal(text, range));
    }
}

/// Byte offset of the next delimiter at or after `from` that is not preceded
/// by the escape character.
fn find_unescaped(text: &str, from: usize, delimiters: &Delimiters) -> Option<usize> {
    let mut prev = text[..from].chars().next_back();
    for (offset, c) in text[from..].char_indices() {
        if c == delimiters.delimiter && prev != Some(delimiters.escape) {
            return Some(from + offset);
        }
        prev = Some(c);
    }
    None
}

/// Byte offset of the next unescaped doubled delimiter at or after `from`.
fn find_double(text: &str, from: usize, delimiters: &Delimiters) -> Option<usize> {
    let delim_len = delimiters.delimiter.len_utf8();
    let mut pos = from;
    while let Some(found) = find_unescaped(text, pos, delimiters) {
        if text[found + delim_len..].starts_with(delimiters.delimiter) {
            return Some(found);
        }
        pos = found + delim_len;
    }
    None
}
