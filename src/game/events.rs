//! Simulation Events
//!
//! Events generated during the tick, drained by the sync layer for
//! client broadcasting. Processing order is tick, then priority, then
//! the entity involved; equality compares the full payload.

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::game::components::{EntityId, Skill};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Deaths processed first
    Death = 0,
    /// Then damage
    Damage = 1,
    /// Then experience awards
    Experience = 2,
    /// Then respawns
    Respawn = 3,
    /// Lowest priority
    Other = 255,
}

/// Event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// An attack resolved against a defender.
    AttackResolved {
        /// Attacking entity.
        attacker: EntityId,
        /// Defending entity.
        defender: EntityId,
        /// Damage dealt (0 on a miss or a splash).
        damage: u32,
        /// Whether the accuracy roll succeeded.
        hit: bool,
        /// Max hit the attacker rolled under.
        max_hit: u32,
        /// Hit probability the accuracy roll was drawn against.
        accuracy: f64,
        /// Defender's remaining life points.
        defender_health: u32,
    },

    /// An entity ran out of life points.
    Died {
        /// The entity that died.
        entity: EntityId,
        /// Killing entity, if the blow had an owner.
        killer: Option<EntityId>,
    },

    /// A dead entity returned to its spawn point.
    Respawned {
        /// The entity that respawned.
        entity: EntityId,
        /// Respawn position.
        position: Vec2,
    },

    /// Experience was granted.
    XpGained {
        /// Receiving entity.
        entity: EntityId,
        /// Skill trained.
        skill: Skill,
        /// Amount granted (after the cap).
        amount: u64,
        /// New total in the skill.
        total: u64,
        /// New level, present only when the award crossed a threshold.
        new_level: Option<u32>,
    },
}

/// A simulation event with timing and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Entity involved (for tie-breaking)
    pub entity: Option<EntityId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: GameEventData) -> Self {
        let entity = match &data {
            GameEventData::AttackResolved { defender, .. } => Some(*defender),
            GameEventData::Died { entity, .. } => Some(*entity),
            GameEventData::Respawned { entity, .. } => Some(*entity),
            GameEventData::XpGained { entity, .. } => Some(*entity),
        };

        Self {
            tick,
            priority,
            entity,
            data,
        }
    }

    /// Create an attack-resolved event.
    #[allow(clippy::too_many_arguments)]
    pub fn attack_resolved(
        tick: u64,
        attacker: EntityId,
        defender: EntityId,
        damage: u32,
        hit: bool,
        max_hit: u32,
        accuracy: f64,
        defender_health: u32,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::AttackResolved {
                attacker,
                defender,
                damage,
                hit,
                max_hit,
                accuracy,
                defender_health,
            },
        )
    }

    /// Create a death event.
    pub fn died(tick: u64, entity: EntityId, killer: Option<EntityId>) -> Self {
        Self::new(tick, EventPriority::Death, GameEventData::Died { entity, killer })
    }

    /// Create a respawn event.
    pub fn respawned(tick: u64, entity: EntityId, position: Vec2) -> Self {
        Self::new(
            tick,
            EventPriority::Respawn,
            GameEventData::Respawned { entity, position },
        )
    }

    /// Create an experience event.
    pub fn xp_gained(
        tick: u64,
        entity: EntityId,
        skill: Skill,
        amount: u64,
        total: u64,
        new_level: Option<u32>,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Experience,
            GameEventData::XpGained {
                entity,
                skill,
                amount,
                total,
                new_level,
            },
        )
    }
}

impl GameEvent {
    /// Processing-order key: tick, then priority, then entity.
    ///
    /// Kept separate from equality so two events with the same key but
    /// different payloads still compare unequal.
    pub fn sort_key(&self) -> (u64, EventPriority, Option<EntityId>) {
        (self.tick, self.priority, self.entity)
    }
}
