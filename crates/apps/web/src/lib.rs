//! Browser binding of the layer switcher.
//!
//! `LayerSwitcher` implements MapLibre's `IControl` shape, so it can be handed
//! straight to `map.addControl(new LayerSwitcher({ orientation: "horizontal" }))`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::JSON;
use switcher::{ControlOptions, LayerControl};
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

mod dom;
mod host;

pub use dom::DomPanel;
pub use host::{Map, MaplibreHost};

type Control = LayerControl<MaplibreHost, DomPanel>;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

#[wasm_bindgen]
pub struct LayerSwitcher {
    control: Rc<RefCell<Control>>,
}

#[wasm_bindgen]
impl LayerSwitcher {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<LayerSwitcher, JsValue> {
        let options = parse_options(&options)?;
        let control = Rc::new(RefCell::new(LayerControl::new(options, DomPanel::new())));

        let weak = Rc::downgrade(&control);
        control
            .borrow_mut()
            .set_waker(Rc::new(move || pump(&weak)));

        Ok(LayerSwitcher { control })
    }

    #[wasm_bindgen(js_name = onAdd)]
    pub fn on_add(&self, map: Map) -> Result<HtmlElement, JsValue> {
        let container = self
            .control
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("layer switcher is busy"))?
            .attach(MaplibreHost::new(map))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        // Anything the host announced while we were attaching.
        pump_now(&self.control);
        Ok(container)
    }

    #[wasm_bindgen(js_name = onRemove)]
    pub fn on_remove(&self) {
        match self.control.try_borrow_mut() {
            Ok(mut control) => {
                control.detach();
            }
            Err(_) => tracing::warn!("onRemove called while the layer switcher was busy"),
        }
    }

    #[wasm_bindgen(js_name = getDefaultPosition)]
    pub fn default_position(&self) -> String {
        "top-right".to_string()
    }
}

fn parse_options(options: &JsValue) -> Result<ControlOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(ControlOptions::default());
    }
    let raw = JSON::stringify(options).map(String::from)?;
    ControlOptions::from_json(&raw).map_err(|err| JsValue::from_str(&format!("invalid options: {err}")))
}

/// Runs queued events unless the control is already handling some; in that
/// case the running drain loop picks them up.
fn pump(control: &Weak<RefCell<Control>>) {
    if let Some(control) = control.upgrade() {
        pump_now(&control);
    }
}

fn pump_now(control: &Rc<RefCell<Control>>) {
    if let Ok(mut control) = control.try_borrow_mut() {
        control.process_pending();
    }
}
