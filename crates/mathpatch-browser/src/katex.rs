//! KaTeX-backed math providers.
//!
//! Two ways the page may expose KaTeX: the core library (`window.katex`) or
//! only its auto-render helper (`window.renderMathInElement`). Both are
//! probed at call time, so a script that finishes loading later makes the
//! provider available without any re-wiring.

use mathpatch_core::{MathRenderer, RenderError, RenderOptions};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::Document;

use crate::error::js_error_message;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = katex, js_name = renderToString, catch)]
    fn katex_render_to_string(expr: &str, options: &JsValue) -> Result<String, JsValue>;

    #[wasm_bindgen(js_name = renderMathInElement, catch)]
    fn render_math_in_element(element: &web_sys::Element, options: &JsValue)
    -> Result<(), JsValue>;
}

/// Whether `window[name]` is defined.
fn global_defined(name: &str) -> bool {
    js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(name))
        .map(|value| !value.is_undefined() && !value.is_null())
        .unwrap_or(false)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KatexOptions {
    throw_on_error: bool,
    display_mode: bool,
}

impl From<&RenderOptions> for KatexOptions {
    fn from(options: &RenderOptions) -> Self {
        Self {
            throw_on_error: options.throw_on_error,
            display_mode: options.display_mode,
        }
    }
}

#[derive(Serialize)]
struct AutoRenderDelimiter {
    left: &'static str,
    right: &'static str,
    display: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoRenderOptions {
    delimiters: [AutoRenderDelimiter; 1],
    throw_on_error: bool,
}

fn to_js<T: Serialize>(value: &T, provider: &str) -> Result<JsValue, RenderError> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| RenderError::rejected(provider, format!("invalid options: {e}")))
}

/// `katex.renderToString`.
#[derive(Debug, Default)]
pub struct KatexRenderer;

impl MathRenderer for KatexRenderer {
    fn name(&self) -> &str {
        "katex"
    }

    fn is_available(&self) -> bool {
        global_defined("katex")
    }

    fn render_to_string(&self, expr: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let js_options = to_js(&KatexOptions::from(options), self.name())?;
        katex_render_to_string(expr, &js_options)
            .map_err(|e| RenderError::rejected(self.name(), js_error_message(&e)))
    }
}

/// `renderMathInElement` on a detached span holding `\(expr\)`.
///
/// The helper reports problems through its own error callback rather than
/// throwing, so a result without any `.katex` element counts as a rejection.
#[derive(Debug)]
pub struct AutoRenderRenderer {
    document: Document,
}

impl AutoRenderRenderer {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl MathRenderer for AutoRenderRenderer {
    fn name(&self) -> &str {
        "auto-render"
    }

    fn is_available(&self) -> bool {
        global_defined("renderMathInElement")
    }

    fn render_to_string(&self, expr: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let span = self
            .document
            .create_element("span")
            .map_err(|e| RenderError::rejected(self.name(), js_error_message(&e)))?;
        span.set_text_content(Some(&format!("\\({expr}\\)")));

        let js_options = to_js(
            &AutoRenderOptions {
                delimiters: [AutoRenderDelimiter {
                    left: "\\(",
                    right: "\\)",
                    display: options.display_mode,
                }],
                throw_on_error: options.throw_on_error,
            },
            self.name(),
        )?;
        render_math_in_element(&span, &js_options)
            .map_err(|e| RenderError::rejected(self.name(), js_error_message(&e)))?;

        match span.query_selector(".katex") {
            Ok(Some(_)) => Ok(span.inner_html()),
            _ => Err(RenderError::rejected(
                self.name(),
                "auto-render left the expression unrendered",
            )),
        }
    }
}
