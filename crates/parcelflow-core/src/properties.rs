//! Key-value storage for state that must survive a restart.

use std::collections::BTreeMap;

/// Storage for restart state.
///
/// Values are keyed by plain strings;
/// injectors prefix their keys with their own name
/// so several of them can share one store.
pub trait ModelProperties {
    /// Get a stored value.
    fn get(&self, key: &str) -> Option<f64>;

    /// Store a value, replacing any previous one.
    fn set(&mut self, key: &str, value: f64);

    /// Get a stored value or a default if there is none.
    fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }
}

/// An in-memory property store that can be saved to and loaded from JSON.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PropertyStore {
    values: BTreeMap<String, f64>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialise the store to a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a store from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Iterate over all stored keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl ModelProperties for PropertyStore {
    fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }
}
