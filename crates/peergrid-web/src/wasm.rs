#![forbid(unsafe_code)]

use wasm_bindgen::prelude::*;

use crate::{GridHost, WebError};

fn to_js(err: WebError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// JS-facing tile grid.
///
/// The host wires `ResizeObserver`, `window.onresize`, and its render hook
/// to the methods below, calls `tick` from `requestAnimationFrame`, and
/// restyles every tile whenever `tick` returns `true`. All timestamps are
/// `performance.now()` values.
#[wasm_bindgen]
pub struct PeerGrid {
    host: GridHost,
}

#[wasm_bindgen]
impl PeerGrid {
    /// Create a grid. `options` is an optional JSON object, for example
    /// `{"quietPeriodMs": 200, "logDecisions": true}`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: Option<String>) -> Result<PeerGrid, JsValue> {
        let host = GridHost::from_json(options.as_deref().unwrap_or("")).map_err(to_js)?;
        Ok(Self { host })
    }

    /// Bind the grid element with its current client size.
    pub fn mount(&mut self, width: f64, height: f64, now_ms: f64) {
        self.host.mount(width, height, now_ms);
    }

    /// Release the grid element and cancel pending work.
    pub fn unmount(&mut self, now_ms: f64) -> bool {
        self.host.unmount(now_ms)
    }

    /// `ResizeObserver` callback for the grid element.
    #[wasm_bindgen(js_name = observeResize)]
    pub fn observe_resize(&mut self, width: f64, height: f64, now_ms: f64) -> bool {
        self.host.observe_resize(width, height, now_ms)
    }

    /// `window` resize callback.
    #[wasm_bindgen(js_name = viewportResize)]
    pub fn viewport_resize(&mut self, width: f64, height: f64, now_ms: f64) -> bool {
        self.host.viewport_resize(width, height, now_ms)
    }

    /// Post-render hook carrying the number of tiles drawn.
    #[wasm_bindgen(js_name = setTileCount)]
    pub fn set_tile_count(&mut self, tile_count: u32, now_ms: f64) -> bool {
        self.host.set_tile_count(tile_count as usize, now_ms)
    }

    /// Advance time. Returns `true` when tiles must be restyled.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.host.tick(now_ms)
    }

    /// Milliseconds until the pending recompute, or `undefined`.
    #[wasm_bindgen(js_name = nextDeadline)]
    pub fn next_deadline(&self, now_ms: f64) -> Option<f64> {
        self.host.next_deadline(now_ms)
    }

    #[wasm_bindgen(js_name = tileWidth)]
    pub fn tile_width(&self) -> f64 {
        self.host.tile_width()
    }

    #[wasm_bindgen(js_name = tileHeight)]
    pub fn tile_height(&self) -> f64 {
        self.host.tile_height()
    }

    /// Current tile style as JSON.
    #[wasm_bindgen(js_name = styleJson)]
    pub fn style_json(&self) -> Result<String, JsValue> {
        self.host.style_json().map_err(to_js)
    }

    /// Current tile style as inline CSS.
    #[wasm_bindgen(js_name = styleCss)]
    pub fn style_css(&self) -> String {
        self.host.style_css()
    }

    /// Decision ledger as JSONL.
    #[wasm_bindgen(js_name = decisionLogsJsonl)]
    pub fn decision_logs_jsonl(&self) -> String {
        self.host.decision_logs_jsonl()
    }
}
