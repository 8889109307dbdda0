//! Game simulation.
//!
//! Everything under this module is deterministic given a seed and a
//! command stream. Collaborator traits at the bottom are the only seams
//! to external systems (item storage, persistence).

pub mod combat;
pub mod components;
pub mod events;
pub mod formulas;
pub mod movement;
pub mod store;
pub mod tick;
pub mod validate;
pub mod xp;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::tables::ItemStack;
use crate::game::components::{CombatStats, EntityId};
use crate::game::store::SkillXp;

/// Item storage collaborator.
///
/// Combat consumes ammunition and runes through this seam; the shipping
/// implementation is in-memory, a real item service lives elsewhere.
pub trait Inventory: Send + Sync {
    /// Whether the entity holds at least the given stacks.
    fn has_items(&self, entity: EntityId, items: &[ItemStack]) -> bool;

    /// Remove the given stacks. Returns false (removing nothing) when the
    /// entity does not hold all of them.
    fn remove_items(&mut self, entity: EntityId, items: &[ItemStack]) -> bool;
}

/// Simple in-memory inventory for the demo zone and tests.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    held: BTreeMap<EntityId, BTreeMap<u32, u32>>,
}

impl InMemoryInventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant items to an entity.
    pub fn grant(&mut self, entity: EntityId, item: u32, quantity: u32) {
        *self.held.entry(entity).or_default().entry(item).or_insert(0) += quantity;
    }

    /// Quantity of an item held.
    pub fn count(&self, entity: EntityId, item: u32) -> u32 {
        self.held
            .get(&entity)
            .and_then(|items| items.get(&item))
            .copied()
            .unwrap_or(0)
    }
}

impl Inventory for InMemoryInventory {
    fn has_items(&self, entity: EntityId, items: &[ItemStack]) -> bool {
        items
            .iter()
            .all(|stack| self.count(entity, stack.item) >= stack.quantity)
    }

    fn remove_items(&mut self, entity: EntityId, items: &[ItemStack]) -> bool {
        if !self.has_items(entity, items) {
            return false;
        }
        if let Some(held) = self.held.get_mut(&entity) {
            for stack in items {
                if let Some(count) = held.get_mut(&stack.item) {
                    *count -= stack.quantity;
                }
            }
        }
        true
    }
}

/// Persisted player progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Account name.
    pub name: String,
    /// Skill levels.
    pub stats: CombatStats,
    /// Accumulated experience.
    pub xp: SkillXp,
}

/// Player progress storage collaborator.
///
/// The zone loads a record on join and saves on leave; real storage is
/// an external service.
pub trait Persistence: Send + Sync {
    /// Load a player's record by account name.
    fn load_record(&self, name: &str) -> Option<PlayerRecord>;

    /// Save a player's record.
    fn save_record(&mut self, record: &PlayerRecord);
}

/// Persistence that stores nothing.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn load_record(&self, _name: &str) -> Option<PlayerRecord> {
        None
    }

    fn save_record(&mut self, _record: &PlayerRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_inventory() {
        let mut inv = InMemoryInventory::new();
        let e = EntityId(1);

        inv.grant(e, 100, 5);
        assert!(inv.has_items(e, &[ItemStack::new(100, 5)]));
        assert!(!inv.has_items(e, &[ItemStack::new(100, 6)]));

        assert!(inv.remove_items(e, &[ItemStack::new(100, 3)]));
        assert_eq!(inv.count(e, 100), 2);

        // Partial holdings remove nothing
        assert!(!inv.remove_items(e, &[ItemStack::new(100, 2), ItemStack::new(101, 1)]));
        assert_eq!(inv.count(e, 100), 2);
    }
}
