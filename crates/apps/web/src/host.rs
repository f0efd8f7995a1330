use std::collections::HashMap;

use js_sys::{Array, Function, JSON, Reflect};
use switcher::{
    EventSink, HostEventKind, LayerCollection, LayerDescriptor, LayerId, LayerMetadata, ListenerId,
    MapHost, Visibility,
};
use tracing::warn;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// A MapLibre GL `Map` instance, as passed to `IControl.onAdd`.
    #[derive(Debug, Clone)]
    pub type Map;

    #[wasm_bindgen(method, catch, js_name = getStyle)]
    fn get_style(this: &Map) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = getLayoutProperty)]
    fn get_layout_property(this: &Map, layer: &str, name: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = setLayoutProperty)]
    fn set_layout_property(this: &Map, layer: &str, name: &str, value: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_name = isStyleLoaded)]
    fn is_style_loaded(this: &Map) -> JsValue;

    #[wasm_bindgen(method)]
    fn on(this: &Map, kind: &str, listener: &Function);

    #[wasm_bindgen(method)]
    fn once(this: &Map, kind: &str, listener: &Function);

    #[wasm_bindgen(method)]
    fn off(this: &Map, kind: &str, listener: &Function);
}

struct Subscription {
    kind: HostEventKind,
    callback: Closure<dyn FnMut()>,
}

/// [`MapHost`] over a live MapLibre map.
///
/// Owns the JS closures it registers; dropping the host unregisters whatever
/// is still subscribed so the map never calls into freed closures.
pub struct MaplibreHost {
    map: Map,
    next_listener: u64,
    subscriptions: HashMap<ListenerId, Subscription>,
}

impl std::fmt::Debug for MaplibreHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaplibreHost")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl MaplibreHost {
    pub fn new(map: Map) -> Self {
        Self {
            map,
            next_listener: 0,
            subscriptions: HashMap::new(),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    fn listen(&mut self, kind: HostEventKind, sink: EventSink, once: bool) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;

        let callback = Closure::<dyn FnMut()>::new(move || {
            sink.push(kind.event());
        });
        let function: &Function = callback.as_ref().unchecked_ref();
        if once {
            self.map.once(kind.name(), function);
        } else {
            self.map.on(kind.name(), function);
        }
        self.subscriptions.insert(id, Subscription { kind, callback });
        id
    }

    fn describe(&self, layer: &JsValue) -> Option<LayerDescriptor> {
        let id = Reflect::get(layer, &JsValue::from_str("id")).ok()?.as_string()?;

        let metadata = Reflect::get(layer, &JsValue::from_str("metadata"))
            .ok()
            .filter(|m| m.is_object())
            .and_then(|m| JSON::stringify(&m).ok())
            .map(|raw| LayerMetadata::from_json(&String::from(raw)))
            .unwrap_or_default();

        let visibility = match self.map.get_layout_property(&id, "visibility") {
            Ok(value) => Visibility::from_property(value.as_string().as_deref()),
            Err(err) => {
                warn!("getLayoutProperty({id}) failed: {err:?}");
                Visibility::Visible
            }
        };

        Some(LayerDescriptor::new(id, visibility).with_metadata(metadata))
    }
}

impl MapHost for MaplibreHost {
    fn layers(&self) -> Option<LayerCollection> {
        let style = match self.map.get_style() {
            Ok(style) => style,
            Err(err) => {
                warn!("getStyle failed: {err:?}");
                return None;
            }
        };
        if style.is_undefined() || style.is_null() {
            return None;
        }

        let layers = Reflect::get(&style, &JsValue::from_str("layers")).ok()?;
        if !Array::is_array(&layers) {
            return Some(LayerCollection::default());
        }
        let layers: Array = layers.unchecked_into();
        Some(layers.iter().filter_map(|layer| self.describe(&layer)).collect())
    }

    fn set_visibility(&mut self, layer: &LayerId, visibility: Visibility) {
        let value = JsValue::from_str(visibility.as_str());
        if let Err(err) = self.map.set_layout_property(layer.as_str(), "visibility", &value) {
            warn!("setLayoutProperty({layer}) failed: {err:?}");
        }
    }

    fn is_style_loaded(&self) -> bool {
        self.map.is_style_loaded().as_bool().unwrap_or(false)
    }

    fn subscribe(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId {
        self.listen(kind, sink, false)
    }

    fn subscribe_once(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId {
        self.listen(kind, sink, true)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        if let Some(sub) = self.subscriptions.remove(&listener) {
            self.map.off(sub.kind.name(), sub.callback.as_ref().unchecked_ref());
        }
    }
}

impl Drop for MaplibreHost {
    fn drop(&mut self) {
        for (_, sub) in self.subscriptions.drain() {
            self.map.off(sub.kind.name(), sub.callback.as_ref().unchecked_ref());
        }
    }
}
