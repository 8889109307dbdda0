//! Columnar World Store
//!
//! One ordered map per component. BTreeMap keeps iteration order stable
//! across runs, which the determinism guarantee depends on.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::game::components::{
    ActivePrayers, AttackTimer, CombatStats, EntityId, EquipmentBonuses, Health, Loadout,
    MovementState, Position, Respawn, Skill,
};

/// Per-skill accumulated experience.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillXp(BTreeMap<Skill, u64>);

impl SkillXp {
    /// Experience held in a skill.
    pub fn get(&self, skill: Skill) -> u64 {
        self.0.get(&skill).copied().unwrap_or(0)
    }

    /// Set experience in a skill.
    pub fn set(&mut self, skill: Skill, xp: u64) {
        self.0.insert(skill, xp);
    }
}

/// Rectangular zone bounds in tiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Width in tiles.
    pub width: f32,
    /// Height in tiles.
    pub height: f32,
}

impl WorldBounds {
    /// Position lies inside the zone.
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.is_finite() && pos.is_in_bounds(self.width, self.height)
    }
}

/// The zone's entity state.
///
/// All mutation happens through tick systems; the network layer only reads.
/// Mutating accessors mark the entity dirty so the sync layer can build
/// minimal deltas.
#[derive(Clone, Debug, Default)]
pub struct WorldStore {
    next_id: u32,
    /// Zone bounds.
    pub bounds: WorldBounds,

    /// Positions.
    pub positions: BTreeMap<EntityId, Position>,
    /// Life points.
    pub health: BTreeMap<EntityId, Health>,
    /// Combat skill levels.
    pub stats: BTreeMap<EntityId, CombatStats>,
    /// Equipment bonuses.
    pub bonuses: BTreeMap<EntityId, EquipmentBonuses>,
    /// Weapon, ammo and spell selection.
    pub loadouts: BTreeMap<EntityId, Loadout>,
    /// Attack cooldowns.
    pub attack_timers: BTreeMap<EntityId, AttackTimer>,
    /// Movement state.
    pub movement: BTreeMap<EntityId, MovementState>,
    /// Current attack targets.
    pub targets: BTreeMap<EntityId, EntityId>,
    /// Accumulated experience.
    pub xp: BTreeMap<EntityId, SkillXp>,
    /// Active prayers.
    pub prayers: BTreeMap<EntityId, ActivePrayers>,
    /// Respawn behavior.
    pub respawn: BTreeMap<EntityId, Respawn>,
    /// Display names.
    pub names: BTreeMap<EntityId, String>,
    /// Player-controlled entities.
    pub players: BTreeSet<EntityId>,

    /// Tick at which a currently-dead entity died.
    pub died_at: BTreeMap<EntityId, u64>,

    dirty: BTreeSet<EntityId>,
    removed: Vec<EntityId>,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
        }
    }
}

impl WorldStore {
    /// Create an empty store with the given bounds.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: WorldBounds { width, height },
            ..Default::default()
        }
    }

    /// Allocate a fresh entity id.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Entity exists (has a position).
    pub fn contains(&self, id: EntityId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Entity exists and has life points left.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.contains(id) && self.health.get(&id).map(|h| !h.is_dead()).unwrap_or(false)
    }

    /// Remove an entity and every component attached to it.
    ///
    /// The removal is recorded for the sync layer.
    pub fn despawn(&mut self, id: EntityId) {
        let existed = self.positions.remove(&id).is_some();
        self.health.remove(&id);
        self.stats.remove(&id);
        self.bonuses.remove(&id);
        self.loadouts.remove(&id);
        self.attack_timers.remove(&id);
        self.movement.remove(&id);
        self.targets.remove(&id);
        self.xp.remove(&id);
        self.prayers.remove(&id);
        self.respawn.remove(&id);
        self.names.remove(&id);
        self.players.remove(&id);
        self.died_at.remove(&id);
        self.dirty.remove(&id);

        // Anyone targeting the departed entity loses their target
        self.targets.retain(|_, target| *target != id);

        if existed {
            self.removed.push(id);
        }
    }

    /// Position of an entity.
    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.positions.get(&id).map(|p| p.vec())
    }

    /// Move an entity, marking it dirty.
    pub fn set_position(&mut self, id: EntityId, pos: Vec2) {
        if let Some(p) = self.positions.get_mut(&id) {
            p.0 = pos;
            self.dirty.insert(id);
        }
    }

    /// Apply damage to an entity.
    ///
    /// Returns `(dealt, died)`. Dealt may be less than requested when the
    /// entity had fewer life points left.
    pub fn apply_damage(&mut self, id: EntityId, damage: u32) -> Option<(u32, bool)> {
        let hp = self.health.get_mut(&id)?;
        let was_alive = !hp.is_dead();
        let dealt = hp.apply_damage(damage);
        self.dirty.insert(id);
        Some((dealt, was_alive && hp.is_dead()))
    }

    /// Restore an entity to full health, marking it dirty.
    pub fn restore_full_health(&mut self, id: EntityId) {
        if let Some(hp) = self.health.get_mut(&id) {
            hp.current = hp.max;
            self.dirty.insert(id);
        }
    }

    /// Mark an entity as changed since the last broadcast.
    pub fn mark_dirty(&mut self, id: EntityId) {
        self.dirty.insert(id);
    }

    /// Drain the set of entities mutated since the last broadcast.
    pub fn take_dirty(&mut self) -> BTreeSet<EntityId> {
        std::mem::take(&mut self.dirty)
    }

    /// Drain the list of entities removed since the last broadcast.
    pub fn take_removed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.removed)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.positions.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
