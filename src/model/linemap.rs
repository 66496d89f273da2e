//! Line ID maps: how viewers label and group timeline rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps each line id to one label per column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineIdMap {
    pub title: String,
    pub column_names: Vec<String>,
    pub labels: BTreeMap<i64, Vec<String>>,
}

impl LineIdMap {
    pub fn new(title: impl Into<String>, column_names: Vec<String>) -> Self {
        Self {
            title: title.into(),
            column_names,
            labels: BTreeMap::new(),
        }
    }

    /// Record labels for a line; later calls overwrite earlier ones
    pub fn insert(&mut self, line_id: i64, labels: Vec<String>) {
        self.labels.insert(line_id, labels);
    }

    pub fn label(&self, line_id: i64) -> Option<&[String]> {
        self.labels.get(&line_id).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Keep only the given lines
    pub fn retain_lines(&mut self, keep: impl Fn(i64) -> bool) {
        self.labels.retain(|id, _| keep(*id));
    }
}
