use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Axis along which layer items are laid out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    #[default]
    Vertical,
}

/// Construction-time configuration of a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlOptions {
    pub orientation: Orientation,
    /// Show a label row describing the selected layer. Any JSON value is
    /// accepted and read by JS truthiness, so `null` or `0` turn it off.
    #[serde(deserialize_with = "deserialize_truthy")]
    pub with_label: bool,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Vertical,
            with_label: false,
        }
    }
}

/// Reads any JSON value as a flag, the way a JS `if` would.
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let truthy = match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    Ok(truthy)
}

impl ControlOptions {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }
}
