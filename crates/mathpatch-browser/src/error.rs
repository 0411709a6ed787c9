use mathpatch_core::ConfigError;
use miette::Diagnostic;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

#[derive(Debug, Error, Diagnostic)]
pub enum HostError {
    #[error("no global window")]
    #[diagnostic(code(mathpatch::browser::no_window))]
    NoWindow,

    #[error("window has no document")]
    #[diagnostic(code(mathpatch::browser::no_document))]
    NoDocument,

    #[error("document has no body to observe")]
    #[diagnostic(code(mathpatch::browser::no_body))]
    NoBody,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("DOM call failed: {0}")]
    #[diagnostic(code(mathpatch::browser::js))]
    Js(String),
}

impl From<JsValue> for HostError {
    fn from(value: JsValue) -> Self {
        HostError::Js(js_error_message(&value))
    }
}

/// Best-effort message from a thrown JS value.
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
