//! In-memory host and panel.
//!
//! Both types are cheap handles over shared state, like the JS objects they
//! stand in for: clone one, hand the clone to a control, and keep the other to
//! drive events and inspect the result.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::SurfaceError;
use crate::events::{ControlEvent, EventSink, HostEventKind, ListenerId};
use crate::host::MapHost;
use crate::layer::{LayerCollection, LayerDescriptor, LayerId, Visibility};
use crate::surface::{
    Alignment, Anchor, ItemContent, ItemHandle, ItemSpec, LabelContent, PanelLayout, PanelSurface,
};

#[derive(Debug)]
struct Listener {
    id: ListenerId,
    kind: HostEventKind,
    sink: EventSink,
    once: bool,
}

#[derive(Debug, Default)]
struct MapState {
    style: Option<Vec<LayerDescriptor>>,
    loaded: bool,
    next_listener: u64,
    listeners: Vec<Listener>,
    unsubscribed: Vec<ListenerId>,
    visibility_writes: usize,
    style_data_on_write: bool,
}

impl MapState {
    /// Sinks listening for `kind`; one-shot listeners are dropped on the way.
    fn take_targets(&mut self, kind: HostEventKind) -> Vec<EventSink> {
        let targets = self
            .listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.sink.clone())
            .collect();
        self.listeners.retain(|l| !(l.once && l.kind == kind));
        targets
    }
}

/// Map host backed by a plain layer list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMap {
    inner: Rc<RefCell<MapState>>,
}

impl InMemoryMap {
    /// A host whose style has not loaded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A host with a loaded style holding `layers`.
    pub fn with_layers(layers: Vec<LayerDescriptor>) -> Self {
        let map = Self::new();
        {
            let mut s = map.inner.borrow_mut();
            s.style = Some(layers);
            s.loaded = true;
        }
        map
    }

    /// Replaces the style's layers without notifying anyone.
    pub fn set_layers(&self, layers: Vec<LayerDescriptor>) {
        self.inner.borrow_mut().style = Some(layers);
    }

    /// Drops the style entirely; `layers()` returns `None` afterwards.
    pub fn clear_style(&self) {
        self.inner.borrow_mut().style = None;
    }

    /// Mimics hosts that announce every layout write with a `styledata` event.
    pub fn set_style_data_on_write(&self, enabled: bool) {
        self.inner.borrow_mut().style_data_on_write = enabled;
    }

    /// Pushes `kind` to its listeners. Returns how many accepted it.
    pub fn emit(&self, kind: HostEventKind) -> usize {
        // Release the borrow first: a sink's waker may call back into the host.
        let targets = self.inner.borrow_mut().take_targets(kind);
        targets.iter().filter(|sink| sink.push(kind.event())).count()
    }

    /// Swaps in a new style and announces it.
    pub fn reload(&self, layers: Vec<LayerDescriptor>) -> usize {
        self.set_layers(layers);
        self.emit(HostEventKind::StyleData)
    }

    /// Flips the loaded flag without emitting anything, as a host does when a
    /// style change settles after its `load` already fired.
    pub fn set_loaded(&self, loaded: bool) {
        self.inner.borrow_mut().loaded = loaded;
    }

    /// Completes the initial load and announces it.
    pub fn finish_loading(&self) -> usize {
        self.inner.borrow_mut().loaded = true;
        self.emit(HostEventKind::Load)
    }

    pub fn visibility(&self, id: &str) -> Option<Visibility> {
        let s = self.inner.borrow();
        s.style
            .as_ref()?
            .iter()
            .find(|l| l.id.as_str() == id)
            .map(|l| l.visibility)
    }

    /// Ids of every layer currently shown, in style order.
    pub fn visible_ids(&self) -> Vec<String> {
        let s = self.inner.borrow();
        s.style
            .iter()
            .flatten()
            .filter(|l| l.visibility.is_visible())
            .map(|l| l.id.to_string())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Every listener id passed to `unsubscribe`, in call order.
    pub fn unsubscribed(&self) -> Vec<ListenerId> {
        self.inner.borrow().unsubscribed.clone()
    }

    pub fn visibility_writes(&self) -> usize {
        self.inner.borrow().visibility_writes
    }
}

impl MapHost for InMemoryMap {
    fn layers(&self) -> Option<LayerCollection> {
        let s = self.inner.borrow();
        s.style.as_ref().map(|layers| LayerCollection::new(layers.clone()))
    }

    fn set_visibility(&mut self, layer: &LayerId, visibility: Visibility) {
        let announce = {
            let mut s = self.inner.borrow_mut();
            let Some(target) = s
                .style
                .as_mut()
                .and_then(|layers| layers.iter_mut().find(|l| &l.id == layer))
            else {
                return;
            };
            target.visibility = visibility;
            s.visibility_writes += 1;
            s.style_data_on_write
        };
        if announce {
            self.emit(HostEventKind::StyleData);
        }
    }

    fn is_style_loaded(&self) -> bool {
        self.inner.borrow().loaded
    }

    fn subscribe(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId {
        self.add_listener(kind, sink, false)
    }

    fn subscribe_once(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId {
        self.add_listener(kind, sink, true)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        let mut s = self.inner.borrow_mut();
        s.listeners.retain(|l| l.id != listener);
        s.unsubscribed.push(listener);
    }
}

impl InMemoryMap {
    fn add_listener(&mut self, kind: HostEventKind, sink: EventSink, once: bool) -> ListenerId {
        let mut s = self.inner.borrow_mut();
        let id = ListenerId(s.next_listener);
        s.next_listener += 1;
        s.listeners.push(Listener { id, kind, sink, once });
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemBody {
    Image { src: String },
    Text(String),
}

/// Observable state of one rendered item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: LayerId,
    pub title: String,
    pub body: ItemBody,
    pub pressed: bool,
    /// Free-form attributes a test can plant to detect unwanted rebuilds.
    pub markers: BTreeMap<String, String>,
    /// Number of in-place updates since creation.
    pub updates: u32,
}

#[derive(Debug)]
struct Slot {
    handle: ItemHandle,
    record: ItemRecord,
    sink: EventSink,
}

#[derive(Debug)]
struct PanelState {
    built: bool,
    mounted: bool,
    parent_class: String,
    layout: Option<PanelLayout>,
    open: bool,
    generation: u32,
    slots: Vec<Slot>,
    toggle_sink: Option<EventSink>,
    label: Option<LabelContent>,
    alignment: Option<Alignment>,
    frames: Vec<EventSink>,
    items_created: usize,
    builds: usize,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            built: false,
            mounted: false,
            parent_class: "maplibregl-ctrl-top-right".to_string(),
            layout: None,
            open: false,
            generation: 0,
            slots: Vec::new(),
            toggle_sink: None,
            label: None,
            alignment: None,
            frames: Vec::new(),
            items_created: 0,
            builds: 0,
        }
    }
}

impl PanelState {
    fn slot_mut(&mut self, handle: ItemHandle) -> Option<&mut Slot> {
        if handle.generation() != self.generation {
            return None;
        }
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.handle == handle)
    }

    fn slot_by_id(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.record.id.as_str() == id)
    }
}

/// Panel surface that records an element tree instead of touching a DOM.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPanel {
    inner: Rc<RefCell<PanelState>>,
}

impl InMemoryPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class list of the host corner the container gets mounted in.
    pub fn set_parent_class(&self, class_name: &str) {
        self.inner.borrow_mut().parent_class = class_name.to_string();
    }

    pub fn is_built(&self) -> bool {
        self.inner.borrow().built
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().mounted
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }

    pub fn layout(&self) -> Option<PanelLayout> {
        self.inner.borrow().layout
    }

    pub fn builds(&self) -> usize {
        self.inner.borrow().builds
    }

    /// Total items ever created, across all renders.
    pub fn items_created(&self) -> usize {
        self.inner.borrow().items_created
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|s| s.record.id.to_string())
            .collect()
    }

    pub fn pressed_ids(&self) -> Vec<String> {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|s| s.record.pressed)
            .map(|s| s.record.id.to_string())
            .collect()
    }

    pub fn item(&self, id: &str) -> Option<ItemRecord> {
        self.inner.borrow().slot_by_id(id).map(|s| s.record.clone())
    }

    pub fn snapshot(&self) -> Vec<ItemRecord> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|s| s.record.clone())
            .collect()
    }

    pub fn set_marker(&self, id: &str, key: &str, value: &str) -> bool {
        let mut s = self.inner.borrow_mut();
        let Some(slot) = s.slots.iter_mut().find(|slot| slot.record.id.as_str() == id) else {
            return false;
        };
        slot.record.markers.insert(key.to_string(), value.to_string());
        true
    }

    pub fn label(&self) -> Option<LabelContent> {
        self.inner.borrow().label.clone()
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.inner.borrow().alignment
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Activates the item for `id`, as a user click would.
    pub fn click(&self, id: &str) -> bool {
        let sink = match self.inner.borrow().slot_by_id(id) {
            Some(slot) => slot.sink.clone(),
            None => return false,
        };
        sink.push(ControlEvent::ItemPressed(LayerId::new(id)))
    }

    pub fn click_toggle(&self) -> bool {
        let sink = self.inner.borrow().toggle_sink.clone();
        sink.is_some_and(|s| s.push(ControlEvent::TogglePressed))
    }

    /// Reports that the thumbnail of `id` could not be loaded.
    pub fn fail_image(&self, id: &str) -> bool {
        let sink = match self.inner.borrow().slot_by_id(id) {
            Some(slot) if matches!(slot.record.body, ItemBody::Image { .. }) => slot.sink.clone(),
            _ => return false,
        };
        sink.push(ControlEvent::ImageFailed(LayerId::new(id)))
    }

    /// Fires every scheduled layout frame. Returns how many were accepted.
    pub fn run_frames(&self) -> usize {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        frames
            .into_iter()
            .filter(|sink| sink.push(ControlEvent::LayoutFrame))
            .count()
    }
}

impl PanelSurface for InMemoryPanel {
    type Container = InMemoryPanel;

    fn build(&mut self, layout: &PanelLayout, sink: &EventSink) -> Result<Self::Container, SurfaceError> {
        let mut s = self.inner.borrow_mut();
        s.built = true;
        s.mounted = true;
        s.builds += 1;
        s.layout = Some(*layout);
        s.open = false;
        s.toggle_sink = Some(sink.clone());
        s.label = layout.with_label.then(LabelContent::default);
        s.alignment = None;
        drop(s);
        Ok(self.clone())
    }

    fn release(&mut self) {
        let mut s = self.inner.borrow_mut();
        s.built = false;
        s.mounted = false;
        s.slots.clear();
        s.generation = s.generation.wrapping_add(1);
        s.toggle_sink = None;
        s.label = None;
    }

    fn set_open(&mut self, open: bool) {
        self.inner.borrow_mut().open = open;
    }

    fn clear_items(&mut self) {
        let mut s = self.inner.borrow_mut();
        s.slots.clear();
        s.generation = s.generation.wrapping_add(1);
    }

    fn create_item(&mut self, spec: &ItemSpec, sink: &EventSink) -> Result<ItemHandle, SurfaceError> {
        let mut s = self.inner.borrow_mut();
        if !s.built {
            return Err(SurfaceError::Dom("panel is not built".to_string()));
        }
        let handle = ItemHandle::new(s.slots.len() as u32, s.generation);
        let body = match &spec.content {
            ItemContent::Image { src, .. } => ItemBody::Image { src: src.clone() },
            ItemContent::Text(text) => ItemBody::Text(text.clone()),
        };
        s.slots.push(Slot {
            handle,
            record: ItemRecord {
                id: spec.id.clone(),
                title: spec.title.clone(),
                body,
                pressed: spec.selected,
                markers: BTreeMap::new(),
                updates: 0,
            },
            sink: sink.clone(),
        });
        s.items_created += 1;
        Ok(handle)
    }

    fn set_item_selected(&mut self, item: ItemHandle, selected: bool) -> bool {
        let mut s = self.inner.borrow_mut();
        let Some(slot) = s.slot_mut(item) else {
            return false;
        };
        slot.record.pressed = selected;
        slot.record.updates += 1;
        true
    }

    fn show_item_text(&mut self, item: ItemHandle, text: &str) -> bool {
        let mut s = self.inner.borrow_mut();
        let Some(slot) = s.slot_mut(item) else {
            return false;
        };
        slot.record.body = ItemBody::Text(text.to_string());
        slot.record.updates += 1;
        true
    }

    fn set_label(&mut self, label: &LabelContent) {
        let mut s = self.inner.borrow_mut();
        if s.label.is_some() {
            s.label = Some(label.clone());
        }
    }

    fn schedule_layout(&mut self, sink: &EventSink) {
        self.inner.borrow_mut().frames.push(sink.clone());
    }

    fn anchor(&self) -> Option<Anchor> {
        let s = self.inner.borrow();
        s.mounted.then(|| Anchor::from_class_name(&s.parent_class))
    }

    fn set_alignment(&mut self, alignment: Alignment) {
        self.inner.borrow_mut().alignment = Some(alignment);
    }
}
