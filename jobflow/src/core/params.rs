//! Caller-supplied parameter bag.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The parameter bag supplied to `perform`.
///
/// Params are replaced wholesale on each `perform` call and are expected
/// to be forwarded unchanged across continuations of the same logical
/// job; the engine does not diff or detect drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: HashMap<String, serde_json::Value>,
}

impl Params {
    /// Creates an empty parameter bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Gets a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Returns true if the bag holds `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates the supplied parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the subset of `required` names absent from this bag,
    /// preserving the order of `required`.
    #[must_use]
    pub fn missing_of(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.values.contains_key(*name))
            .cloned()
            .collect()
    }
}

impl From<HashMap<String, serde_json::Value>> for Params {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, serde_json::Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
