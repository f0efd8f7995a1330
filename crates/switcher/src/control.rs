use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::ControlError;
use crate::events::{ControlEvent, EventSink, HostEventKind, ListenerId};
use crate::host::MapHost;
use crate::layer::{LayerCollection, LayerId};
use crate::options::ControlOptions;
use crate::reconciler::PanelReconciler;
use crate::selection::{self, SelectionTracker, VisibilityAssignment};
use crate::surface::{Alignment, LabelContent, PanelLayout, PanelSurface};

/// Lifecycle state of a control.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Detached,
    Closed,
    Open,
}

/// Everything that only exists while attached to a host.
struct Attachment<H> {
    host: H,
    sink: EventSink,
    style_listener: ListenerId,
    /// One-shot `load` subscription, until it fires.
    pending_load: Option<ListenerId>,
    /// Set once the first selection derivation and render happened.
    initialized: bool,
    open: bool,
}

/// A layer switcher bound to one host at a time.
///
/// Attaching builds the panel and subscribes to the host; events are then fed
/// in through the attachment's [`EventSink`] and handled by
/// [`process_pending`](Self::process_pending) (or directly via
/// [`handle`](Self::handle)). Detaching undoes all of it.
pub struct LayerControl<H: MapHost, S: PanelSurface> {
    options: ControlOptions,
    surface: S,
    attachment: Option<Attachment<H>>,
    tracker: SelectionTracker,
    reconciler: PanelReconciler,
    waker: Option<Rc<dyn Fn()>>,
}

impl<H: MapHost, S: PanelSurface> LayerControl<H, S> {
    pub fn new(options: ControlOptions, surface: S) -> Self {
        Self {
            options,
            surface,
            attachment: None,
            tracker: SelectionTracker::new(),
            reconciler: PanelReconciler::new(),
            waker: None,
        }
    }

    /// Callback installed on every future attachment's sink.
    pub fn set_waker(&mut self, waker: Rc<dyn Fn()>) {
        self.waker = Some(waker);
    }

    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        match &self.attachment {
            None => Phase::Detached,
            Some(att) if att.open => Phase::Open,
            Some(_) => Phase::Closed,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn selected(&self) -> Option<&LayerId> {
        self.tracker.selected()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn host(&self) -> Option<&H> {
        self.attachment.as_ref().map(|att| &att.host)
    }

    pub fn sink(&self) -> Option<&EventSink> {
        self.attachment.as_ref().map(|att| &att.sink)
    }

    /// Builds the panel and starts listening to `host`.
    ///
    /// If the host already finished loading, the first selection and render
    /// happen right away; otherwise they wait for the host's `load` event.
    pub fn attach(&mut self, mut host: H) -> Result<S::Container, ControlError> {
        if self.attachment.is_some() {
            return Err(ControlError::AlreadyAttached);
        }

        let sink = EventSink::new();
        if let Some(waker) = &self.waker {
            sink.set_waker(Rc::clone(waker));
        }

        let layout = PanelLayout {
            orientation: self.options.orientation,
            with_label: self.options.with_label,
        };
        let container = self.surface.build(&layout, &sink)?;

        let style_listener = host.subscribe(HostEventKind::StyleData, sink.clone());
        let loaded = host.is_style_loaded();
        let pending_load = if loaded {
            None
        } else {
            Some(host.subscribe_once(HostEventKind::Load, sink.clone()))
        };
        self.surface.schedule_layout(&sink);

        self.tracker.clear();
        self.reconciler.reset();
        self.attachment = Some(Attachment {
            host,
            sink,
            style_listener,
            pending_load,
            initialized: false,
            open: false,
        });
        debug!(loaded, "layer control attached");

        if loaded {
            self.initialize();
        }
        Ok(container)
    }

    /// Unsubscribes, releases the panel and hands the host back.
    ///
    /// Returns `None` if the control was not attached.
    pub fn detach(&mut self) -> Option<H> {
        let mut att = self.attachment.take()?;
        att.sink.close();
        att.host.unsubscribe(att.style_listener);
        if let Some(listener) = att.pending_load.take() {
            att.host.unsubscribe(listener);
        }
        self.surface.release();
        self.reconciler.reset();
        self.tracker.clear();
        debug!("layer control detached");
        Some(att.host)
    }

    /// Handles queued events until the inbox is empty. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0usize;
        while let Some(event) = self.attachment.as_ref().and_then(|att| att.sink.pop()) {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Handles one event. Ignored while detached.
    pub fn handle(&mut self, event: ControlEvent) {
        if self.attachment.is_none() {
            return;
        }
        match event {
            ControlEvent::StyleData => self.on_style_data(),
            ControlEvent::Load => self.on_load(),
            ControlEvent::TogglePressed => self.toggle(),
            ControlEvent::ItemPressed(id) => self.select_layer(&id),
            ControlEvent::ImageFailed(id) => {
                self.reconciler.image_failed(&mut self.surface, &id);
            }
            ControlEvent::LayoutFrame => self.align(),
        }
    }

    fn on_load(&mut self) {
        if self.attachment.as_ref().is_some_and(|att| !att.initialized) {
            self.initialize();
        }
    }

    fn on_style_data(&mut self) {
        let Some(att) = self.attachment.as_ref() else {
            return;
        };
        if att.initialized {
            self.reconcile();
        } else if att.host.is_style_loaded() {
            // The host can finish loading without a `load` we are still waiting for.
            debug!("host loaded without a load event; initializing from style data");
            self.initialize();
        } else {
            trace!("style data before initial load; waiting for load");
        }
    }

    fn initialize(&mut self) {
        if let Some(att) = self.attachment.as_mut() {
            att.initialized = true;
            if let Some(listener) = att.pending_load.take() {
                att.host.unsubscribe(listener);
            }
        }
        self.reconcile();
    }

    /// Re-reads the host's layers and re-renders if their membership changed.
    fn reconcile(&mut self) {
        let Some(att) = self.attachment.as_mut() else {
            return;
        };
        let collection = att.host.layers().unwrap_or_default();
        if !self.reconciler.needs_full_render(&collection) {
            trace!("layer membership unchanged; keeping rendered panel");
            return;
        }

        let outcome = self.tracker.revalidate(&collection);
        debug!(layers = collection.len(), ?outcome, "layer membership changed");

        if let Some(assignment) = outcome
            .selection()
            .and_then(|id| selection::select(&collection, id))
        {
            apply_to_host(&mut att.host, &assignment);
        }
        self.reconciler.render(
            &mut self.surface,
            &collection,
            self.tracker.selected(),
            &att.sink,
        );
        self.refresh_label(&collection);
    }

    /// Shows `id` alone on the host and moves the pressed state to it.
    fn select_layer(&mut self, id: &LayerId) {
        let Some(att) = self.attachment.as_mut() else {
            return;
        };
        let Some(collection) = self.reconciler.rendered() else {
            return;
        };
        let previous = self.tracker.selected().cloned();
        let Some(assignment) = self.tracker.select(collection, id) else {
            trace!(layer = id.as_str(), "ignoring selection of unknown layer");
            return;
        };
        let label = collection.get(id).map(LabelContent::for_layer);

        apply_to_host(&mut att.host, &assignment);
        self.reconciler
            .apply_selection(&mut self.surface, previous.as_ref(), Some(id));
        if self.options.with_label
            && let Some(label) = label
        {
            self.surface.set_label(&label);
        }
    }

    fn refresh_label(&mut self, collection: &LayerCollection) {
        if !self.options.with_label {
            return;
        }
        let label = self
            .tracker
            .selected()
            .and_then(|id| collection.get(id))
            .map(LabelContent::for_layer)
            .unwrap_or_default();
        self.surface.set_label(&label);
    }

    fn toggle(&mut self) {
        let Some(att) = self.attachment.as_mut() else {
            return;
        };
        att.open = !att.open;
        self.surface.set_open(att.open);
    }

    fn align(&mut self) {
        if self.attachment.is_none() {
            return;
        }
        match self.surface.anchor() {
            Some(anchor) => self.surface.set_alignment(Alignment::for_anchor(anchor)),
            None => trace!("container not mounted; skipping alignment"),
        }
    }
}

impl<H: MapHost, S: PanelSurface> Drop for LayerControl<H, S> {
    fn drop(&mut self) {
        self.detach();
    }
}

fn apply_to_host<H: MapHost>(host: &mut H, assignment: &VisibilityAssignment) {
    for (id, visibility) in assignment.iter() {
        host.set_visibility(id, visibility);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerDescriptor, LayerMetadata, Visibility};
    use crate::memory::{InMemoryMap, InMemoryPanel, ItemBody};
    use crate::surface::{CrossAlign, Stacking};
    use pretty_assertions::assert_eq;

    type Control = LayerControl<InMemoryMap, InMemoryPanel>;

    fn layer(id: &str, visibility: Visibility) -> LayerDescriptor {
        LayerDescriptor::new(id, visibility)
    }

    fn abc() -> Vec<LayerDescriptor> {
        vec![
            layer("A", Visibility::Visible),
            layer("B", Visibility::None),
            layer("C", Visibility::None),
        ]
    }

    fn attached(layers: Vec<LayerDescriptor>, options: ControlOptions) -> (Control, InMemoryMap, InMemoryPanel) {
        let map = InMemoryMap::with_layers(layers);
        let panel = InMemoryPanel::new();
        let mut control = LayerControl::new(options, panel.clone());
        control.attach(map.clone()).unwrap();
        (control, map, panel)
    }

    fn assert_single_selection(map: &InMemoryMap, panel: &InMemoryPanel) {
        let visible = map.visible_ids();
        assert_eq!(visible.len(), 1, "host shows {visible:?}");
        assert_eq!(panel.pressed_ids(), visible);
    }

    #[test]
    fn initial_render_selects_first_visible_layer() {
        let (control, map, panel) = attached(abc(), ControlOptions::default());
        assert_eq!(control.selected(), Some(&LayerId::from("A")));
        assert_eq!(panel.item_ids(), vec!["A", "B", "C"]);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn initial_render_fixes_multiple_visible_layers() {
        let layers = vec![
            layer("A", Visibility::None),
            layer("B", Visibility::Visible),
            layer("C", Visibility::Visible),
        ];
        let (control, map, panel) = attached(layers, ControlOptions::default());
        assert_eq!(control.selected(), Some(&LayerId::from("B")));
        assert_eq!(map.visibility("C"), Some(Visibility::None));
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn initial_render_shows_first_layer_when_none_visible() {
        let layers = vec![layer("A", Visibility::None), layer("B", Visibility::None)];
        let (_control, map, panel) = attached(layers, ControlOptions::default());
        assert_eq!(map.visible_ids(), vec!["A"]);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn selecting_an_item_updates_host_and_panel() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        assert!(panel.click("C"));
        assert_eq!(control.process_pending(), 1);

        assert_eq!(map.visibility("A"), Some(Visibility::None));
        assert_eq!(map.visibility("B"), Some(Visibility::None));
        assert_eq!(map.visibility("C"), Some(Visibility::Visible));
        assert_eq!(panel.pressed_ids(), vec!["C"]);
        assert_eq!(control.selected(), Some(&LayerId::from("C")));
    }

    #[test]
    fn selection_leaves_unaffected_items_untouched() {
        let layers = vec![
            layer("A", Visibility::Visible),
            layer("B", Visibility::None),
            layer("C", Visibility::None),
            layer("D", Visibility::None),
        ];
        let (mut control, _map, panel) = attached(layers, ControlOptions::default());
        panel.set_marker("B", "hover", "1");
        panel.set_marker("D", "hover", "1");
        let b = panel.item("B").unwrap();
        let d = panel.item("D").unwrap();
        let created = panel.items_created();

        panel.click("C");
        control.process_pending();

        assert_eq!(panel.item("B").unwrap(), b);
        assert_eq!(panel.item("D").unwrap(), d);
        assert_eq!(panel.item("A").unwrap().updates, 1);
        assert_eq!(panel.item("C").unwrap().updates, 1);
        assert_eq!(panel.items_created(), created);
    }

    #[test]
    fn host_echoing_writes_as_style_data_does_not_rebuild() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        map.set_style_data_on_write(true);
        panel.set_marker("B", "focus", "yes");
        let created = panel.items_created();

        panel.click("C");
        control.process_pending();
        panel.click("A");
        control.process_pending();

        assert_eq!(panel.items_created(), created);
        assert_eq!(panel.item("B").unwrap().markers.get("focus").map(String::as_str), Some("yes"));
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn shrinking_collection_falls_back_to_first_layer() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        panel.click("C");
        control.process_pending();
        let created = panel.items_created();

        let shrunk: Vec<_> = map
            .layers()
            .unwrap()
            .iter()
            .filter(|l| l.id.as_str() != "C")
            .cloned()
            .collect();
        assert_eq!(map.reload(shrunk), 1);
        control.process_pending();

        assert_eq!(control.selected(), Some(&LayerId::from("A")));
        assert_eq!(map.visibility("A"), Some(Visibility::Visible));
        assert_eq!(map.visibility("B"), Some(Visibility::None));
        assert_eq!(panel.item_ids(), vec!["A", "B"]);
        assert_eq!(panel.items_created(), created + 2);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn growing_collection_keeps_selection_and_hides_newcomers() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        panel.click("B");
        control.process_pending();

        let mut grown = map.layers().unwrap().iter().cloned().collect::<Vec<_>>();
        grown.push(layer("D", Visibility::Visible));
        map.reload(grown);
        control.process_pending();

        assert_eq!(control.selected(), Some(&LayerId::from("B")));
        assert_eq!(panel.item_ids(), vec!["A", "B", "C", "D"]);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn reload_with_same_membership_keeps_rendered_items() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        let before = panel.snapshot();
        let created = panel.items_created();

        map.reload(map.layers().unwrap().iter().cloned().collect());
        control.process_pending();

        assert_eq!(panel.snapshot(), before);
        assert_eq!(panel.items_created(), created);
    }

    #[test]
    fn empty_collection_renders_nothing_and_writes_nothing() {
        let (mut control, map, panel) = attached(Vec::new(), ControlOptions::default());
        assert!(panel.item_ids().is_empty());
        assert_eq!(control.selected(), None);
        assert_eq!(map.visibility_writes(), 0);

        panel.click_toggle();
        control.process_pending();
        assert_eq!(control.phase(), Phase::Open);
    }

    #[test]
    fn missing_style_is_treated_as_empty() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        map.clear_style();
        map.emit(HostEventKind::StyleData);
        control.process_pending();
        assert!(panel.item_ids().is_empty());
        assert_eq!(control.selected(), None);
    }

    #[test]
    fn unknown_selection_is_ignored() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        let writes = map.visibility_writes();
        control.sink().unwrap().push(ControlEvent::ItemPressed(LayerId::from("Z")));
        control.process_pending();
        assert_eq!(control.selected(), Some(&LayerId::from("A")));
        assert_eq!(map.visibility_writes(), writes);
        assert_eq!(panel.pressed_ids(), vec!["A"]);
    }

    #[test]
    fn failed_thumbnail_shows_abbreviation() {
        let with_thumb = layer("satellite", Visibility::Visible).with_metadata(LayerMetadata {
            placeholder: Some("https://example.invalid/sat.png".to_string()),
            ..LayerMetadata::default()
        });
        let (mut control, _map, panel) = attached(
            vec![with_thumb, layer("streets", Visibility::None)],
            ControlOptions::default(),
        );
        assert!(panel.fail_image("satellite"));
        control.process_pending();

        let item = panel.item("satellite").unwrap();
        assert_eq!(item.body, ItemBody::Text("SAT".to_string()));
        assert!(item.pressed);
        assert_eq!(control.selected(), Some(&LayerId::from("satellite")));
        assert!(!panel.fail_image("satellite"));
    }

    #[test]
    fn waits_for_load_when_style_not_ready() {
        let map = InMemoryMap::new();
        let panel = InMemoryPanel::new();
        let mut control = LayerControl::new(ControlOptions::default(), panel.clone());
        control.attach(map.clone()).unwrap();
        assert_eq!(map.listener_count(), 2);

        map.set_layers(abc());
        map.emit(HostEventKind::StyleData);
        control.process_pending();
        assert!(panel.item_ids().is_empty());

        assert_eq!(map.finish_loading(), 1);
        control.process_pending();
        assert_eq!(panel.item_ids(), vec!["A", "B", "C"]);
        assert_eq!(map.listener_count(), 1);
        assert_eq!(map.emit(HostEventKind::Load), 0);
        assert_eq!(map.unsubscribed(), vec![ListenerId(1)]);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn initializes_from_style_data_once_host_reports_loaded() {
        let map = InMemoryMap::new();
        let panel = InMemoryPanel::new();
        let mut control = LayerControl::new(ControlOptions::default(), panel.clone());
        control.attach(map.clone()).unwrap();

        map.set_layers(vec![layer("A", Visibility::Visible), layer("B", Visibility::Visible)]);
        map.emit(HostEventKind::StyleData);
        control.process_pending();
        assert!(panel.item_ids().is_empty());

        // No `load` ever arrives; the host just starts reporting loaded.
        map.set_loaded(true);
        map.emit(HostEventKind::StyleData);
        control.process_pending();

        assert_eq!(panel.item_ids(), vec!["A", "B"]);
        assert_eq!(control.selected(), Some(&LayerId::from("A")));
        assert_single_selection(&map, &panel);
        assert_eq!(map.unsubscribed(), vec![ListenerId(1)]);
        assert_eq!(map.listener_count(), 1);

        map.emit(HostEventKind::StyleData);
        control.process_pending();
        assert_eq!(panel.builds(), 1);
        assert_eq!(panel.items_created(), 2);
    }

    #[test]
    fn toggle_opens_and_closes_without_touching_selection() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        assert_eq!(control.phase(), Phase::Closed);
        let writes = map.visibility_writes();

        panel.click_toggle();
        control.process_pending();
        assert_eq!(control.phase(), Phase::Open);
        assert!(panel.is_open());

        panel.click_toggle();
        control.process_pending();
        assert_eq!(control.phase(), Phase::Closed);
        assert!(!panel.is_open());
        assert_eq!(map.visibility_writes(), writes);
        assert_eq!(control.selected(), Some(&LayerId::from("A")));
    }

    #[test]
    fn layout_frame_aligns_to_host_corner() {
        let map = InMemoryMap::with_layers(abc());
        let panel = InMemoryPanel::new();
        panel.set_parent_class("maplibregl-ctrl-bottom-left");
        let mut control = LayerControl::new(ControlOptions::default(), panel.clone());
        control.attach(map).unwrap();
        assert_eq!(panel.alignment(), None);

        assert_eq!(panel.run_frames(), 1);
        control.process_pending();
        let alignment = panel.alignment().unwrap();
        assert_eq!(alignment.cross, CrossAlign::Start);
        assert_eq!(alignment.stacking, Stacking::BottomUp);
    }

    #[test]
    fn detach_releases_everything_and_is_idempotent() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        let sink = control.sink().unwrap().clone();

        assert!(control.detach().is_some());
        assert_eq!(control.phase(), Phase::Detached);
        assert_eq!(map.listener_count(), 0);
        assert!(!panel.is_mounted());
        assert!(!sink.is_open());

        assert_eq!(panel.run_frames(), 0);
        assert_eq!(map.reload(vec![layer("X", Visibility::Visible)]), 0);
        control.handle(ControlEvent::ItemPressed(LayerId::from("X")));
        assert_eq!(control.process_pending(), 0);
        assert!(panel.alignment().is_none());

        assert!(control.detach().is_none());
    }

    #[test]
    fn detach_before_load_drops_pending_load_listener() {
        let map = InMemoryMap::new();
        let mut control = LayerControl::new(ControlOptions::default(), InMemoryPanel::new());
        control.attach(map.clone()).unwrap();
        control.detach();
        assert_eq!(map.listener_count(), 0);
        assert_eq!(map.finish_loading(), 0);
    }

    #[test]
    fn reattach_starts_fresh() {
        let (mut control, map, panel) = attached(abc(), ControlOptions::default());
        assert!(matches!(control.attach(map.clone()), Err(ControlError::AlreadyAttached)));

        let old_sink = control.sink().unwrap().clone();
        let map = control.detach().unwrap();
        map.set_layers(vec![layer("X", Visibility::None), layer("Y", Visibility::Visible)]);
        control.attach(map.clone()).unwrap();

        assert!(!old_sink.push(ControlEvent::ItemPressed(LayerId::from("X"))));
        assert_eq!(control.selected(), Some(&LayerId::from("Y")));
        assert_eq!(panel.item_ids(), vec!["X", "Y"]);
        assert_eq!(panel.builds(), 2);
        assert_single_selection(&map, &panel);
    }

    #[test]
    fn label_follows_selection() {
        let named = layer("sat", Visibility::None).with_metadata(LayerMetadata {
            name: Some("Satellite".to_string()),
            caption: Some("Esri".to_string()),
            placeholder: None,
        });
        let (mut control, _map, panel) = attached(
            vec![layer("osm", Visibility::Visible), named],
            ControlOptions {
                with_label: true,
                ..ControlOptions::default()
            },
        );
        assert_eq!(panel.label().unwrap().text, "osm");

        panel.click("sat");
        control.process_pending();
        assert_eq!(
            panel.label().unwrap(),
            LabelContent {
                tag: "sat".to_string(),
                text: "Satellite".to_string(),
                caption: " (Esri)".to_string(),
            }
        );
    }

    #[test]
    fn label_row_absent_by_default() {
        let (_control, _map, panel) = attached(abc(), ControlOptions::default());
        assert!(panel.label().is_none());
        assert_eq!(panel.layout().map(|l| l.with_label), Some(false));
    }

    #[test]
    fn drop_detaches() {
        let map = InMemoryMap::with_layers(abc());
        {
            let mut control = LayerControl::new(ControlOptions::default(), InMemoryPanel::new());
            control.attach(map.clone()).unwrap();
            assert_eq!(map.listener_count(), 1);
        }
        assert_eq!(map.listener_count(), 0);
    }
}
