use crate::error::SurfaceError;
use crate::events::EventSink;
use crate::layer::{LayerDescriptor, LayerId};
use crate::options::Orientation;

/// Generational handle to a rendered item (index, generation).
///
/// Surfaces bump the generation whenever they clear their items, so a handle
/// from an earlier render never resolves to a newer element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    index: u32,
    generation: u32,
}

impl ItemHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    /// Thumbnail with the text to show instead if it fails to load.
    Image { src: String, fallback: String },
    Text(String),
}

/// Everything a surface needs to create one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub id: LayerId,
    pub title: String,
    pub content: ItemContent,
    pub selected: bool,
}

impl ItemSpec {
    pub fn for_layer(layer: &LayerDescriptor, selected: bool) -> Self {
        let abbreviation = layer.id.abbreviation();
        let content = match layer.metadata.placeholder.as_deref() {
            Some(src) if !src.is_empty() => ItemContent::Image {
                src: src.to_string(),
                fallback: abbreviation,
            },
            _ => ItemContent::Text(abbreviation),
        };
        Self {
            id: layer.id.clone(),
            title: layer.title().to_string(),
            content,
            selected,
        }
    }
}

/// Text of the optional label row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelContent {
    /// The raw identifier, only when a display name is shown next to it.
    pub tag: String,
    pub text: String,
    pub caption: String,
}

impl LabelContent {
    pub fn for_layer(layer: &LayerDescriptor) -> Self {
        let meta = &layer.metadata;
        Self {
            tag: if meta.display_name().is_some() {
                layer.id.to_string()
            } else {
                String::new()
            },
            text: layer.title().to_string(),
            caption: meta
                .caption
                .as_deref()
                .map(|c| format!(" ({c})"))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PanelLayout {
    pub orientation: Orientation,
    pub with_label: bool,
}

/// Corner of the host the container was placed in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Anchor {
    pub left: bool,
    pub bottom: bool,
}

impl Anchor {
    /// Reads a corner from a parent class list such as `maplibregl-ctrl-bottom-left`.
    pub fn from_class_name(class_name: &str) -> Self {
        Self {
            left: class_name.contains("left"),
            bottom: class_name.contains("bottom"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrossAlign {
    Start,
    End,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stacking {
    TopDown,
    BottomUp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub cross: CrossAlign,
    pub stacking: Stacking,
}

impl Alignment {
    pub fn for_anchor(anchor: Anchor) -> Self {
        Self {
            cross: if anchor.left {
                CrossAlign::Start
            } else {
                CrossAlign::End
            },
            stacking: if anchor.bottom {
                Stacking::BottomUp
            } else {
                Stacking::TopDown
            },
        }
    }
}

/// Element layer the control renders into.
///
/// Item operations taking an [`ItemHandle`] return `false` when the handle no
/// longer resolves; callers treat that as "nothing to update".
pub trait PanelSurface {
    /// What the host mounts; an `HtmlElement` in the browser.
    type Container: Clone;

    /// Creates the container with its toggle, panel, list and (optionally)
    /// label row. The toggle pushes [`ControlEvent::TogglePressed`] into `sink`.
    ///
    /// [`ControlEvent::TogglePressed`]: crate::events::ControlEvent::TogglePressed
    fn build(&mut self, layout: &PanelLayout, sink: &EventSink) -> Result<Self::Container, SurfaceError>;

    /// Detaches the container and drops every element and callback.
    fn release(&mut self);

    fn set_open(&mut self, open: bool);

    /// Removes all items and invalidates their handles.
    fn clear_items(&mut self);

    /// Appends one item. Activation pushes `ItemPressed`, an image load
    /// failure pushes `ImageFailed`, both carrying `spec.id`.
    fn create_item(&mut self, spec: &ItemSpec, sink: &EventSink) -> Result<ItemHandle, SurfaceError>;

    fn set_item_selected(&mut self, item: ItemHandle, selected: bool) -> bool;

    /// Replaces the item's content (including any image) with `text`.
    fn show_item_text(&mut self, item: ItemHandle, text: &str) -> bool;

    fn set_label(&mut self, label: &LabelContent);

    /// Requests a one-shot `LayoutFrame` on the next paint.
    fn schedule_layout(&mut self, sink: &EventSink);

    /// Where the container sits in the host, or `None` if it is not mounted.
    fn anchor(&self) -> Option<Anchor>;

    fn set_alignment(&mut self, alignment: Alignment);
}
