//! Append-only record of stage results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output map of a job instance, keyed by stage name.
///
/// Entries are appended as stages complete and never removed; the engine
/// writes only the currently executing stage's key, so a stage can
/// overwrite its own result on a re-run but never another stage's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputMap {
    values: HashMap<String, serde_json::Value>,
}

impl OutputMap {
    /// Creates an empty output map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage's result.
    pub fn record(&mut self, stage: impl Into<String>, value: serde_json::Value) {
        self.values.insert(stage.into(), value);
    }

    /// Gets a completed stage's result.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&serde_json::Value> {
        self.values.get(stage)
    }

    /// Returns true if `stage` has a recorded result.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.values.contains_key(stage)
    }

    /// Iterates the stages with recorded results.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no stage has completed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, serde_json::Value>> for OutputMap {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}
