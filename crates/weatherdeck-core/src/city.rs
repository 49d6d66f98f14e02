use serde::{Deserialize, Serialize};

/// A tracked city.
///
/// `key` is the provider's opaque identifier (a numeric region code or a
/// provider slug) and is unique within the tracked set. `label` is only used
/// for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct City {
    pub key: String,
    pub label: String,
}

impl City {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.key)
    }
}
