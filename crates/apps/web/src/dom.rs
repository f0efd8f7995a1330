//! DOM rendering of the layer panel.
//!
//! Items live in generational slots so the reconciler's handles stay valid
//! across targeted updates and go stale after a clear.

use switcher::{
    Alignment, Anchor, ControlEvent, CrossAlign, EventSink, ItemContent, ItemHandle, ItemSpec,
    LabelContent, Orientation, PanelLayout, PanelSurface, Stacking, SurfaceError,
};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, HtmlElement, HtmlImageElement};

const TOGGLE_ICON: &str = r#"<svg width="20" height="20" viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg" style="display: block; margin: auto;"><path d="M11.99 19.0048L4.62 13.2748L3 14.5348L12 21.5348L21 14.5348L19.37 13.2648L11.99 19.0048ZM12 16.4648L19.36 10.7348L21 9.46484L12 2.46484L3 9.46484L4.63 10.7348L12 16.4648ZM12 4.99484L17.74 9.46484L12 13.9348L6.26 9.46484L12 4.99484Z" fill="currentColor"/></svg>"#;

const CONTAINER_STYLE: &[(&str, &str)] = &[
    ("background-color", "transparent"),
    ("border", "none"),
    ("box-shadow", "none"),
    ("display", "flex"),
    ("flex-direction", "column"),
    ("gap", "8px"),
];

const PANEL_STYLE: &[(&str, &str)] = &[
    ("gap", "8px"),
    ("padding", "4px"),
    ("display", "none"),
    ("flex-direction", "column"),
    ("max-width", "220px"),
    ("overflow-y", "auto"),
    ("width", "auto"),
];

const ITEM_STYLE: &[(&str, &str)] = &[
    ("border-radius", "4px"),
    ("font-size", "10px"),
    ("font-weight", "bold"),
    ("align-items", "center"),
    ("box-sizing", "border-box"),
    ("cursor", "pointer"),
    ("display", "flex"),
    ("height", "42px"),
    ("justify-content", "center"),
    ("white-space", "nowrap"),
    ("width", "42px"),
];

const IMAGE_STYLE: &[(&str, &str)] = &[
    ("border-radius", "2px"),
    ("display", "block"),
    ("height", "100%"),
    ("object-fit", "cover"),
    ("pointer-events", "none"),
    ("width", "100%"),
];

const LABEL_STYLE: &[(&str, &str)] = &[
    ("background-color", "#007cbf"),
    ("border-radius", "4px"),
    ("color", "#fff"),
    ("font-size", "14px"),
    ("font-weight", "600"),
    ("margin", "0"),
    ("padding", "8px"),
    ("max-width", "100%"),
];

fn list_style(orientation: Orientation) -> [(&'static str, &'static str); 7] {
    let direction = match orientation {
        Orientation::Vertical => "column",
        Orientation::Horizontal => "row",
    };
    [
        ("display", "flex"),
        ("flex-direction", direction),
        ("gap", "8px"),
        ("margin", "0"),
        ("max-height", "200px"),
        ("overflow-y", "auto"),
        ("width", "auto"),
    ]
}

/// Pressed-state styling of an item.
fn selected_style(selected: bool) -> [(&'static str, &'static str); 3] {
    if selected {
        [
            ("background-color", "#e0f0ff"),
            ("border", "2px solid #007cbf"),
            ("color", "#007cbf"),
        ]
    } else {
        [
            ("background-color", "#f5f5f5"),
            ("border", "none"),
            ("color", "#666"),
        ]
    }
}

fn image_opacity(selected: bool) -> &'static str {
    if selected { "1" } else { "0.6" }
}

fn alignment_style(alignment: Alignment) -> [(&'static str, &'static str); 3] {
    let align_items = match alignment.cross {
        CrossAlign::Start => "flex-start",
        CrossAlign::End => "flex-end",
    };
    let (direction, justify) = match alignment.stacking {
        Stacking::TopDown => ("column", "flex-start"),
        Stacking::BottomUp => ("column-reverse", "flex-end"),
    };
    [
        ("align-items", align_items),
        ("flex-direction", direction),
        ("justify-content", justify),
    ]
}

fn set_styles(el: &HtmlElement, styles: &[(&str, &str)]) {
    let s = el.style();
    for (name, value) in styles {
        let _ = s.set_property(name, value);
    }
}

fn dom_err(err: wasm_bindgen::JsValue) -> SurfaceError {
    SurfaceError::Dom(format!("{err:?}"))
}

fn create(document: &Document, tag: &str, class: &str) -> Result<HtmlElement, SurfaceError> {
    let el: HtmlElement = document.create_element(tag).map_err(dom_err)?.unchecked_into();
    if !class.is_empty() {
        el.set_class_name(class);
    }
    Ok(el)
}

struct LabelElements {
    tag: HtmlElement,
    text: HtmlElement,
    caption: HtmlElement,
}

struct PanelElements {
    container: HtmlElement,
    toggle: HtmlElement,
    panel: HtmlElement,
    list: HtmlElement,
    label: Option<LabelElements>,
    on_toggle: Closure<dyn FnMut()>,
}

struct DomItem {
    handle: ItemHandle,
    button: HtmlElement,
    image: Option<HtmlImageElement>,
    on_click: Closure<dyn FnMut()>,
    on_error: Option<Closure<dyn FnMut()>>,
}

impl DomItem {
    fn drop_image(&mut self) {
        if let Some(img) = self.image.take() {
            img.set_onerror(None);
            img.remove();
        }
        self.on_error = None;
    }

    /// Detaches handlers before the closures are freed.
    fn dispose(mut self) {
        self.drop_image();
        self.button.set_onclick(None);
        self.button.remove();
        drop(self.on_click);
    }
}

/// [`PanelSurface`] rendered with `web-sys`.
#[derive(Default)]
pub struct DomPanel {
    elements: Option<PanelElements>,
    items: Vec<Option<DomItem>>,
    generation: u32,
}

impl std::fmt::Debug for DomPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomPanel")
            .field("built", &self.elements.is_some())
            .field("items", &self.items.iter().flatten().count())
            .field("generation", &self.generation)
            .finish()
    }
}

impl DomPanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn item_mut(&mut self, handle: ItemHandle) -> Option<&mut DomItem> {
        if handle.generation() != self.generation {
            return None;
        }
        self.items
            .get_mut(handle.index() as usize)?
            .as_mut()
            .filter(|item| item.handle == handle)
    }

    fn build_label(document: &Document, panel: &HtmlElement) -> Result<LabelElements, SurfaceError> {
        let row = create(document, "div", "layer-switcher-label")?;
        set_styles(&row, LABEL_STYLE);
        let content = create(document, "div", "layer-switcher-label-content")?;
        set_styles(
            &content,
            &[
                ("overflow", "hidden"),
                ("text-overflow", "ellipsis"),
                ("white-space", "nowrap"),
            ],
        );

        let tag = create(document, "span", "layer-switcher-label-tag")?;
        set_styles(
            &tag,
            &[
                ("background-color", "#eee"),
                ("border-radius", "4px"),
                ("color", "#000"),
                ("font-weight", "500"),
                ("padding", "4px"),
                ("display", "inline-block"),
            ],
        );
        let text = create(document, "span", "layer-switcher-label-text")?;
        set_styles(&text, &[("padding-left", "8px"), ("flex", "0 0 auto")]);
        let caption = create(document, "span", "layer-switcher-label-caption")?;
        set_styles(
            &caption,
            &[
                ("font-weight", "500"),
                ("padding-left", "8px"),
                ("flex", "1 1 auto"),
                ("min-width", "0"),
            ],
        );

        content.append_child(&tag).map_err(dom_err)?;
        content.append_child(&text).map_err(dom_err)?;
        content.append_child(&caption).map_err(dom_err)?;
        row.append_child(&content).map_err(dom_err)?;
        panel.append_child(&row).map_err(dom_err)?;
        Ok(LabelElements { tag, text, caption })
    }

    fn list(&self) -> Result<&HtmlElement, SurfaceError> {
        self.elements
            .as_ref()
            .map(|e| &e.list)
            .ok_or_else(|| SurfaceError::Dom("panel is not built".to_string()))
    }
}

impl PanelSurface for DomPanel {
    type Container = HtmlElement;

    fn build(&mut self, layout: &PanelLayout, sink: &EventSink) -> Result<HtmlElement, SurfaceError> {
        self.release();
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or(SurfaceError::DocumentUnavailable)?;

        let container = create(&document, "div", "maplibregl-ctrl layer-switcher")?;
        set_styles(&container, CONTAINER_STYLE);

        let toggle_group = create(&document, "div", "maplibregl-ctrl-group")?;
        let toggle = create(&document, "button", "layer-switcher-toggle")?;
        toggle.set_attribute("type", "button").map_err(dom_err)?;
        toggle.set_attribute("aria-label", "Layers").map_err(dom_err)?;
        set_styles(&toggle, &[("width", "29px"), ("height", "29px")]);
        toggle.set_inner_html(TOGGLE_ICON);
        let toggle_sink = sink.clone();
        let on_toggle = Closure::<dyn FnMut()>::new(move || {
            toggle_sink.push(ControlEvent::TogglePressed);
        });
        toggle.set_onclick(Some(on_toggle.as_ref().unchecked_ref()));
        toggle_group.append_child(&toggle).map_err(dom_err)?;
        container.append_child(&toggle_group).map_err(dom_err)?;

        let panel = create(&document, "div", "maplibregl-ctrl-group layer-switcher-panel")?;
        set_styles(&panel, PANEL_STYLE);
        container.append_child(&panel).map_err(dom_err)?;

        let list = create(&document, "div", "layer-switcher-layers")?;
        set_styles(&list, &list_style(layout.orientation));
        panel.append_child(&list).map_err(dom_err)?;

        let label = if layout.with_label {
            Some(Self::build_label(&document, &panel)?)
        } else {
            None
        };

        self.elements = Some(PanelElements {
            container: container.clone(),
            toggle,
            panel,
            list,
            label,
            on_toggle,
        });
        Ok(container)
    }

    fn release(&mut self) {
        self.clear_items();
        if let Some(elements) = self.elements.take() {
            elements.toggle.set_onclick(None);
            elements.container.remove();
            drop(elements.on_toggle);
        }
    }

    fn set_open(&mut self, open: bool) {
        if let Some(elements) = &self.elements {
            let display = if open { "flex" } else { "none" };
            let _ = elements.panel.style().set_property("display", display);
        }
    }

    fn clear_items(&mut self) {
        for item in self.items.drain(..).flatten() {
            item.dispose();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn create_item(&mut self, spec: &ItemSpec, sink: &EventSink) -> Result<ItemHandle, SurfaceError> {
        let list = self.list()?.clone();
        let document = list
            .owner_document()
            .ok_or(SurfaceError::DocumentUnavailable)?;

        let button = create(&document, "button", "layer-switcher-item")?;
        button.set_attribute("type", "button").map_err(dom_err)?;
        button.set_attribute("data-id", spec.id.as_str()).map_err(dom_err)?;
        button.set_title(&spec.title);
        set_styles(&button, ITEM_STYLE);

        let (image, on_error) = match &spec.content {
            ItemContent::Image { src, .. } => {
                let img: HtmlImageElement = document
                    .create_element("img")
                    .map_err(dom_err)?
                    .unchecked_into();
                set_styles(&img, IMAGE_STYLE);
                let error_sink = sink.clone();
                let layer = spec.id.clone();
                let on_error = Closure::<dyn FnMut()>::new(move || {
                    error_sink.push(ControlEvent::ImageFailed(layer.clone()));
                });
                img.set_onerror(Some(on_error.as_ref().unchecked_ref()));
                img.set_src(src);
                let _ = button.style().set_property("padding", "0");
                button.append_child(&img).map_err(dom_err)?;
                (Some(img), Some(on_error))
            }
            ItemContent::Text(text) => {
                let _ = button.style().set_property("padding", "4px 8px");
                button.set_inner_text(text);
                (None, None)
            }
        };

        let click_sink = sink.clone();
        let layer = spec.id.clone();
        let on_click = Closure::<dyn FnMut()>::new(move || {
            click_sink.push(ControlEvent::ItemPressed(layer.clone()));
        });
        button.set_onclick(Some(on_click.as_ref().unchecked_ref()));

        apply_selected(&button, image.as_ref(), spec.selected);
        list.append_child(&button).map_err(dom_err)?;

        let handle = ItemHandle::new(self.items.len() as u32, self.generation);
        self.items.push(Some(DomItem {
            handle,
            button,
            image,
            on_click,
            on_error,
        }));
        Ok(handle)
    }

    fn set_item_selected(&mut self, item: ItemHandle, selected: bool) -> bool {
        let Some(item) = self.item_mut(item) else {
            return false;
        };
        apply_selected(&item.button, item.image.as_ref(), selected);
        true
    }

    fn show_item_text(&mut self, item: ItemHandle, text: &str) -> bool {
        let Some(item) = self.item_mut(item) else {
            return false;
        };
        item.drop_image();
        let _ = item.button.style().set_property("padding", "4px 8px");
        item.button.set_inner_text(text);
        true
    }

    fn set_label(&mut self, label: &LabelContent) {
        let Some(row) = self.elements.as_ref().and_then(|e| e.label.as_ref()) else {
            return;
        };
        row.tag.set_inner_text(&label.tag);
        let _ = row
            .tag
            .style()
            .set_property("display", if label.tag.is_empty() { "none" } else { "inline-block" });
        row.text.set_inner_text(&label.text);
        row.caption.set_inner_text(&label.caption);
    }

    fn schedule_layout(&mut self, sink: &EventSink) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let frame_sink = sink.clone();
        // Freed by wasm-bindgen once it has run; a closed sink makes it inert.
        let callback = Closure::once_into_js(move || {
            frame_sink.push(ControlEvent::LayoutFrame);
        });
        if let Err(err) = window.request_animation_frame(callback.unchecked_ref()) {
            tracing::warn!("requestAnimationFrame failed: {err:?}");
        }
    }

    fn anchor(&self) -> Option<Anchor> {
        let parent = self.elements.as_ref()?.container.parent_element()?;
        Some(Anchor::from_class_name(&parent.class_name()))
    }

    fn set_alignment(&mut self, alignment: Alignment) {
        if let Some(elements) = &self.elements {
            set_styles(&elements.container, &alignment_style(alignment));
        }
    }
}

fn apply_selected(button: &HtmlElement, image: Option<&HtmlImageElement>, selected: bool) {
    let _ = button.set_attribute("aria-pressed", if selected { "true" } else { "false" });
    set_styles(button, &selected_style(selected));
    if let Some(img) = image {
        let _ = img.style().set_property("opacity", image_opacity(selected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_axis_follows_orientation() {
        assert!(list_style(Orientation::Vertical).contains(&("flex-direction", "column")));
        assert!(list_style(Orientation::Horizontal).contains(&("flex-direction", "row")));
    }

    #[test]
    fn unselected_thumbnails_are_dimmed() {
        assert_eq!(image_opacity(true), "1");
        assert_eq!(image_opacity(false), "0.6");
        assert!(selected_style(true).contains(&("border", "2px solid #007cbf")));
        assert!(selected_style(false).contains(&("border", "none")));
    }

    #[test]
    fn bottom_left_stacks_upwards_from_the_start_edge() {
        let style = alignment_style(Alignment::for_anchor(Anchor::from_class_name(
            "maplibregl-ctrl-bottom-left",
        )));
        assert_eq!(
            style,
            [
                ("align-items", "flex-start"),
                ("flex-direction", "column-reverse"),
                ("justify-content", "flex-end"),
            ]
        );
    }
}
