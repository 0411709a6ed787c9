//! WASM bindings for mathpatch.
//!
//! Loading the module sets up console logging; `install` then starts the
//! pipeline on the current page. Everything after that is driven by the
//! page's own observers and timers.

use mathpatch_browser::{Config, HostError, with_session};
use serde::Deserialize;
use serde_wasm_bindgen::Deserializer;
use wasm_bindgen::prelude::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    // Another module on the page may already own the global subscriber.
    let _ = set_global_default(Registry::default().with(wasm_layer));
}

fn parse_config(config: Option<JsValue>) -> Result<Config, JsError> {
    match config {
        None => Ok(Config::default()),
        Some(value) if value.is_undefined() || value.is_null() => Ok(Config::default()),
        Some(value) => Config::deserialize(Deserializer::from(value))
            .map_err(|e| JsError::new(&format!("Invalid config: {}", e))),
    }
}

fn host_error(e: HostError) -> JsError {
    JsError::new(&e.to_string())
}

/// Install math rendering on the current page.
///
/// # Arguments
/// * `config` - Optional overrides, camelCase keys (e.g. `{ debounceMs: 50 }`)
///
/// Calling it again after a successful install does nothing.
#[wasm_bindgen]
pub fn install(config: Option<JsValue>) -> Result<(), JsError> {
    let config = parse_config(config)?;
    mathpatch_browser::install(config).map_err(host_error)
}

/// Render a text run through the page session's cache and provider.
///
/// Returns `undefined` before install, while no provider is available, or
/// when the text holds no inline math.
#[wasm_bindgen(js_name = renderText)]
pub fn render_text(text: &str) -> Option<String> {
    with_session(|session| session.render_text(text)).flatten()
}

/// Whether a provider has been bound and passes will render.
#[wasm_bindgen(js_name = isReady)]
pub fn is_ready() -> bool {
    with_session(|session| session.is_ready()).unwrap_or(false)
}

/// Pipeline counters as a plain object, or `undefined` before install.
#[wasm_bindgen]
pub fn stats() -> Result<JsValue, JsError> {
    match with_session(|session| session.stats()) {
        Some(stats) => serde_wasm_bindgen::to_value(&stats)
            .map_err(|e| JsError::new(&format!("Could not encode stats: {}", e))),
        None => Ok(JsValue::UNDEFINED),
    }
}
