//! Advisory memo of earlier ranking decisions

use crate::model::{normalize_name, Category};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category last assigned to each drug, keyed by normalised name.
///
/// Only a hint for the ranking prompt; never overrides a ranking result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankMemory {
    entries: HashMap<String, Category>,
}

impl RankMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Category> {
        self.entries.get(&normalize_name(name)).copied()
    }

    pub fn put(&mut self, name: &str, category: Category) {
        self.entries.insert(normalize_name(name), category);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
