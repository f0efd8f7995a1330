use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a layer inside the host's style. Unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short textual stand-in for a layer: the first three characters, upper-cased.
    pub fn abbreviation(&self) -> String {
        self.0.chars().take(3).collect::<String>().to_uppercase()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Two-valued layout visibility, as stored in the host's `visibility` layout property.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    None,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::None => "none",
        }
    }

    /// Reads a layout property value. Anything other than `"none"` (including an
    /// unset property) counts as visible.
    pub fn from_property(value: Option<&str>) -> Self {
        match value {
            Some("none") => Visibility::None,
            _ => Visibility::Visible,
        }
    }

    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Display metadata attached to a style layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerMetadata {
    pub name: Option<String>,
    pub caption: Option<String>,
    pub placeholder: Option<String>,
}

impl LayerMetadata {
    /// Parses a style layer's `metadata` object.
    ///
    /// Metadata is free-form in a style document, so anything that does not
    /// look like our fields is treated as empty rather than rejected.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str::<LayerMetadata>(raw).unwrap_or_default()
    }

    /// The display name, if one is set and non-empty.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub id: LayerId,
    pub metadata: LayerMetadata,
    pub visibility: Visibility,
}

impl LayerDescriptor {
    pub fn new(id: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            id: LayerId::new(id),
            metadata: LayerMetadata::default(),
            visibility,
        }
    }

    pub fn with_metadata(mut self, metadata: LayerMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Tooltip text: the display name when present, the identifier otherwise.
    pub fn title(&self) -> &str {
        self.metadata.display_name().unwrap_or(self.id.as_str())
    }
}

/// Ordered snapshot of the host's layers.
///
/// Ordering contract:
/// - Iteration follows the host's insertion order, which is also render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerCollection {
    layers: Vec<LayerDescriptor>,
}

impl LayerCollection {
    pub fn new(layers: Vec<LayerDescriptor>) -> Self {
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> + '_ {
        self.layers.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &LayerId> + '_ {
        self.layers.iter().map(|l| &l.id)
    }

    pub fn first(&self) -> Option<&LayerDescriptor> {
        self.layers.first()
    }

    pub fn get(&self, id: &LayerId) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.get(id).is_some()
    }

    /// True when both collections hold the same set of identifiers, regardless
    /// of order or per-layer visibility.
    pub fn same_membership(&self, other: &LayerCollection) -> bool {
        if self.layers.len() != other.layers.len() {
            return false;
        }
        let mine: HashSet<&LayerId> = self.ids().collect();
        other.ids().all(|id| mine.contains(id))
    }
}

impl FromIterator<LayerDescriptor> for LayerCollection {
    fn from_iter<T: IntoIterator<Item = LayerDescriptor>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collection(ids: &[&str]) -> LayerCollection {
        ids.iter()
            .map(|id| LayerDescriptor::new(*id, Visibility::None))
            .collect()
    }

    #[test]
    fn abbreviation_is_three_upper_chars() {
        assert_eq!(LayerId::from("satellite").abbreviation(), "SAT");
        assert_eq!(LayerId::from("os").abbreviation(), "OS");
        assert_eq!(LayerId::from("égout").abbreviation(), "ÉGO");
    }

    #[test]
    fn unset_visibility_counts_as_visible() {
        assert_eq!(Visibility::from_property(None), Visibility::Visible);
        assert_eq!(Visibility::from_property(Some("visible")), Visibility::Visible);
        assert_eq!(Visibility::from_property(Some("none")), Visibility::None);
    }

    #[test]
    fn membership_ignores_order_but_not_ids() {
        let a = collection(&["a", "b", "c"]);
        assert!(a.same_membership(&collection(&["c", "a", "b"])));
        assert!(!a.same_membership(&collection(&["a", "b"])));
        assert!(!a.same_membership(&collection(&["a", "b", "d"])));
        assert!(LayerCollection::default().same_membership(&LayerCollection::default()));
    }

    #[test]
    fn metadata_parses_known_fields_and_tolerates_garbage() {
        let meta = LayerMetadata::from_json(
            r#"{"name":"Satellite","placeholder":"sat.png","mapbox:group":"x"}"#,
        );
        assert_eq!(
            meta,
            LayerMetadata {
                name: Some("Satellite".to_string()),
                caption: None,
                placeholder: Some("sat.png".to_string()),
            }
        );
        assert_eq!(LayerMetadata::from_json("[1,2]"), LayerMetadata::default());
        assert_eq!(LayerMetadata::from_json("null"), LayerMetadata::default());
    }

    #[test]
    fn title_prefers_display_name() {
        let plain = LayerDescriptor::new("osm", Visibility::Visible);
        assert_eq!(plain.title(), "osm");
        let named = plain.with_metadata(LayerMetadata {
            name: Some("OpenStreetMap".to_string()),
            ..LayerMetadata::default()
        });
        assert_eq!(named.title(), "OpenStreetMap");

        let blank = named.with_metadata(LayerMetadata {
            name: Some(String::new()),
            ..LayerMetadata::default()
        });
        assert_eq!(blank.title(), "osm");
    }
}
