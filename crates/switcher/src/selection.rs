use crate::layer::{LayerCollection, LayerId, Visibility};

/// Visibility for every layer of a collection, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityAssignment {
    entries: Vec<(LayerId, Visibility)>,
}

impl VisibilityAssignment {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &LayerId) -> Option<Visibility> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == id)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerId, Visibility)> + '_ {
        self.entries.iter().map(|(id, v)| (id, *v))
    }

    /// Identifiers assigned `visible`. Holds exactly one entry for any
    /// assignment produced by [`select`].
    pub fn visible(&self) -> impl Iterator<Item = &LayerId> + '_ {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_visible())
            .map(|(id, _)| id)
    }
}

/// First layer marked visible, else the first layer, else nothing.
pub fn derive_initial_selection(collection: &LayerCollection) -> Option<LayerId> {
    collection
        .iter()
        .find(|layer| layer.visibility.is_visible())
        .or_else(|| collection.first())
        .map(|layer| layer.id.clone())
}

/// Visibility assignment that shows `id` and hides everything else.
///
/// Returns `None` when `id` is not part of `collection`.
pub fn select(collection: &LayerCollection, id: &LayerId) -> Option<VisibilityAssignment> {
    if !collection.contains(id) {
        return None;
    }
    let entries = collection
        .ids()
        .map(|layer| {
            let visibility = if layer == id {
                Visibility::Visible
            } else {
                Visibility::None
            };
            (layer.clone(), visibility)
        })
        .collect();
    Some(VisibilityAssignment { entries })
}

/// Outcome of re-validating the selection against a new collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// The previous selection is still present.
    Kept(LayerId),
    /// The previous selection disappeared; fell back to the first layer.
    FellBack { removed: LayerId, now: LayerId },
    /// There was no previous selection; derived from host visibility.
    Derived(LayerId),
    /// The collection is empty.
    Cleared,
}

impl Revalidation {
    pub fn selection(&self) -> Option<&LayerId> {
        match self {
            Revalidation::Kept(id) | Revalidation::Derived(id) => Some(id),
            Revalidation::FellBack { now, .. } => Some(now),
            Revalidation::Cleared => None,
        }
    }
}

/// Owns the single-selection state of one control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: Option<LayerId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&LayerId> {
        self.selected.as_ref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Moves the selection to `id`. Unknown identifiers leave the state untouched.
    pub fn select(
        &mut self,
        collection: &LayerCollection,
        id: &LayerId,
    ) -> Option<VisibilityAssignment> {
        let assignment = select(collection, id)?;
        self.selected = Some(id.clone());
        Some(assignment)
    }

    /// Re-establishes a valid selection for a freshly read collection.
    pub fn revalidate(&mut self, collection: &LayerCollection) -> Revalidation {
        let outcome = match self.selected.take() {
            _ if collection.is_empty() => Revalidation::Cleared,
            Some(prev) if collection.contains(&prev) => Revalidation::Kept(prev),
            Some(prev) => match collection.first() {
                Some(first) => Revalidation::FellBack {
                    removed: prev,
                    now: first.id.clone(),
                },
                None => Revalidation::Cleared,
            },
            None => match derive_initial_selection(collection) {
                Some(id) => Revalidation::Derived(id),
                None => Revalidation::Cleared,
            },
        };
        self.selected = outcome.selection().cloned();
        outcome
    }
}
