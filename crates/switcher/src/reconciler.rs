use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::events::EventSink;
use crate::layer::{LayerCollection, LayerId};
use crate::surface::{ItemHandle, ItemSpec, PanelSurface};

/// Keeps the rendered item list in step with the selection.
///
/// The reconciler owns the side table from layer id to item handle. A full
/// render replaces the whole table; a targeted update only looks up the two
/// ids involved and never re-creates elements, so thumbnails that already
/// loaded (or already fell back to text) are left alone.
#[derive(Debug, Default)]
pub struct PanelReconciler {
    rendered: Option<LayerCollection>,
    items: HashMap<LayerId, ItemHandle>,
    text_fallbacks: HashSet<LayerId>,
}

impl PanelReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection of the last full render.
    pub fn rendered(&self) -> Option<&LayerCollection> {
        self.rendered.as_ref()
    }

    pub fn handle(&self, id: &LayerId) -> Option<ItemHandle> {
        self.items.get(id).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// True before the first render and whenever membership changed since.
    pub fn needs_full_render(&self, collection: &LayerCollection) -> bool {
        match &self.rendered {
            None => true,
            Some(prev) => !prev.same_membership(collection),
        }
    }

    /// Clears the surface and creates one item per layer, in collection order.
    ///
    /// Returns the number of items created. Items the surface fails to create
    /// are skipped; the next full render retries them.
    pub fn render<S: PanelSurface>(
        &mut self,
        surface: &mut S,
        collection: &LayerCollection,
        selection: Option<&LayerId>,
        sink: &EventSink,
    ) -> usize {
        surface.clear_items();
        self.items.clear();
        self.text_fallbacks.clear();

        for layer in collection.iter() {
            let spec = ItemSpec::for_layer(layer, selection == Some(&layer.id));
            match surface.create_item(&spec, sink) {
                Ok(handle) => {
                    self.items.insert(layer.id.clone(), handle);
                }
                Err(err) => warn!("skipping item for layer {}: {err}", layer.id),
            }
        }

        self.rendered = Some(collection.clone());
        debug!(
            items = self.items.len(),
            selected = ?selection.map(LayerId::as_str),
            "panel rendered"
        );
        self.items.len()
    }

    /// Moves the pressed state from `previous` to `next`.
    ///
    /// Touches at most two items. Ids without a live item are skipped.
    /// Returns the number of items updated.
    pub fn apply_selection<S: PanelSurface>(
        &mut self,
        surface: &mut S,
        previous: Option<&LayerId>,
        next: Option<&LayerId>,
    ) -> usize {
        let mut touched = 0usize;

        if let Some(prev) = previous
            && Some(prev) != next
        {
            touched += usize::from(self.set_selected(surface, prev, false));
        }
        if let Some(next) = next {
            touched += usize::from(self.set_selected(surface, next, true));
        }

        trace!(touched, "selection applied");
        touched
    }

    /// Swaps a failed thumbnail for the layer's abbreviation.
    ///
    /// Idempotent; returns `true` only when the item changed.
    pub fn image_failed<S: PanelSurface>(&mut self, surface: &mut S, id: &LayerId) -> bool {
        if self.text_fallbacks.contains(id) {
            return false;
        }
        let Some(handle) = self.items.get(id).copied() else {
            return false;
        };
        if !surface.show_item_text(handle, &id.abbreviation()) {
            return false;
        }
        trace!(layer = id.as_str(), "thumbnail replaced with text");
        self.text_fallbacks.insert(id.clone());
        true
    }

    /// Forgets everything rendered, e.g. after the surface was released.
    pub fn reset(&mut self) {
        self.rendered = None;
        self.items.clear();
        self.text_fallbacks.clear();
    }

    fn set_selected<S: PanelSurface>(&self, surface: &mut S, id: &LayerId, selected: bool) -> bool {
        let Some(handle) = self.items.get(id).copied() else {
            trace!(layer = id.as_str(), "no rendered item to update");
            return false;
        };
        surface.set_item_selected(handle, selected)
    }
}
