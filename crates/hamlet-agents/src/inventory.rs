//! Agent inventory: an ordered item list with a hard quantity cap.
//!
//! The cap is enforced silently. An add that would overflow is truncated
//! to whatever fits; callers are never refused, matching the engine-wide
//! capacity policy.

use serde::{Deserialize, Serialize};

/// Total quantity an agent can carry.
pub const INVENTORY_CAP: u32 = 40;

/// One inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item name (`bread`, `tool`, ...).
    pub name: String,
    /// Type tag (`food`, `tool`, `gift`, ...).
    pub kind: String,
    /// Quantity in this slot.
    pub quantity: u32,
}

/// An agent's carried items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<InventoryItem>,
}

impl Inventory {
    /// Create an empty inventory.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Total quantity across all slots.
    pub fn total(&self) -> u32 {
        self.items
            .iter()
            .map(|i| i.quantity)
            .fold(0u32, u32::saturating_add)
    }

    /// All slots, in insertion order.
    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    /// Quantity held of a named item.
    pub fn quantity_of(&self, name: &str) -> u32 {
        self.items
            .iter()
            .filter(|i| i.name == name)
            .map(|i| i.quantity)
            .fold(0u32, u32::saturating_add)
    }

    /// Quantity held of a type tag (`food`, `tool`, ...).
    pub fn quantity_of_kind(&self, kind: &str) -> u32 {
        self.items
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.quantity)
            .fold(0u32, u32::saturating_add)
    }

    /// Add items, truncating quietly at the cap.
    ///
    /// Returns the quantity actually added.
    pub fn add(&mut self, name: &str, kind: &str, quantity: u32) -> u32 {
        let room = INVENTORY_CAP.saturating_sub(self.total());
        let added = quantity.min(room);
        if added == 0 {
            return 0;
        }
        if let Some(slot) = self
            .items
            .iter_mut()
            .find(|i| i.name == name && i.kind == kind)
        {
            slot.quantity = slot.quantity.saturating_add(added);
        } else {
            self.items.push(InventoryItem {
                name: name.to_owned(),
                kind: kind.to_owned(),
                quantity: added,
            });
        }
        added
    }

    /// Remove up to `quantity` of a named item.
    ///
    /// Returns the quantity actually removed; empty slots are dropped.
    pub fn remove(&mut self, name: &str, quantity: u32) -> u32 {
        let mut remaining = quantity;
        for slot in &mut self.items {
            if slot.name == name && remaining > 0 {
                let taken = slot.quantity.min(remaining);
                slot.quantity = slot.quantity.saturating_sub(taken);
                remaining = remaining.saturating_sub(taken);
            }
        }
        self.items.retain(|i| i.quantity > 0);
        quantity.saturating_sub(remaining)
    }

    /// Remove up to `quantity` of a type tag, oldest slots first.
    pub fn remove_kind(&mut self, kind: &str, quantity: u32) -> u32 {
        let mut remaining = quantity;
        for slot in &mut self.items {
            if slot.kind == kind && remaining > 0 {
                let taken = slot.quantity.min(remaining);
                slot.quantity = slot.quantity.saturating_sub(taken);
                remaining = remaining.saturating_sub(taken);
            }
        }
        self.items.retain(|i| i.quantity > 0);
        quantity.saturating_sub(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_truncates_quietly() {
        let mut inv = Inventory::new();
        assert_eq!(inv.add("bread", "food", 35), 35);
        assert_eq!(inv.add("tool", "tool", 10), 5);
        assert_eq!(inv.total(), INVENTORY_CAP);
        assert_eq!(inv.add("more", "food", 1), 0);
    }

    #[test]
    fn add_merges_matching_slots() {
        let mut inv = Inventory::new();
        inv.add("bread", "food", 2);
        inv.add("bread", "food", 3);
        assert_eq!(inv.items().len(), 1);
        assert_eq!(inv.quantity_of("bread"), 5);
    }

    #[test]
    fn remove_spans_slots_and_drops_empties() {
        let mut inv = Inventory::new();
        inv.add("bread", "food", 2);
        inv.add("apple", "food", 3);
        assert_eq!(inv.remove_kind("food", 4), 4);
        assert_eq!(inv.total(), 1);
        assert_eq!(inv.remove("bread", 5), 0);
    }
}
