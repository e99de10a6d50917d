//! The environment tree: object states inside buildings.
//!
//! Detailed plan actions may reference an object (`oven`, `desk`, ...)
//! whose state the consequence engine updates on execution, and the
//! cognitive cycle occasionally asks the oracle which objects changed
//! state during an activity. States are free-form short strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Object states grouped by building name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentTree {
    buildings: BTreeMap<String, BTreeMap<String, String>>,
}

impl EnvironmentTree {
    /// Create an empty tree.
    pub const fn new() -> Self {
        Self {
            buildings: BTreeMap::new(),
        }
    }

    /// Set an object's state inside a building.
    pub fn set_object_state(&mut self, building: &str, object: &str, state: &str) {
        self.buildings
            .entry(building.to_owned())
            .or_default()
            .insert(object.to_owned(), state.to_owned());
    }

    /// Read an object's state.
    pub fn object_state(&self, building: &str, object: &str) -> Option<&str> {
        self.buildings
            .get(building)
            .and_then(|objects| objects.get(object))
            .map(String::as_str)
    }

    /// All objects and their states inside a building.
    pub fn objects_in(&self, building: &str) -> Vec<(&str, &str)> {
        self.buildings
            .get(building)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(name, state)| (name.as_str(), state.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// One-line summary for prompts (`oven: cold, table: floured`).
    pub fn summary(&self, building: &str) -> String {
        let parts: Vec<String> = self
            .objects_in(building)
            .iter()
            .map(|(name, state)| format!("{name}: {state}"))
            .collect();
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_update_in_place() {
        let mut tree = EnvironmentTree::new();
        tree.set_object_state("bakery", "oven", "cold");
        tree.set_object_state("bakery", "oven", "roaring");
        assert_eq!(tree.object_state("bakery", "oven"), Some("roaring"));
        assert_eq!(tree.objects_in("bakery").len(), 1);
        assert!(tree.objects_in("forge").is_empty());
    }

    #[test]
    fn summary_joins_objects() {
        let mut tree = EnvironmentTree::new();
        tree.set_object_state("bakery", "oven", "cold");
        tree.set_object_state("bakery", "table", "floured");
        assert_eq!(tree.summary("bakery"), "oven: cold, table: floured");
    }
}
