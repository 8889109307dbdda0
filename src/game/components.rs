//! Entity Component Types
//!
//! Plain data attached to entities in the world store. Components carry no
//! behavior; the tick systems in this module's siblings mutate them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::data::tables::CombatStyle;

/// Opaque entity identifier, monotonic within a zone.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Trainable skills.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    /// Melee accuracy.
    Attack,
    /// Melee damage.
    Strength,
    /// Damage avoidance.
    Defence,
    /// Ranged accuracy and damage.
    Ranged,
    /// Spell accuracy and damage.
    Magic,
    /// Life points.
    Hitpoints,
    /// Prayer reserves.
    Prayer,
}

impl Skill {
    /// All skills in canonical order.
    pub const ALL: [Skill; 7] = [
        Skill::Attack,
        Skill::Strength,
        Skill::Defence,
        Skill::Ranged,
        Skill::Magic,
        Skill::Hitpoints,
        Skill::Prayer,
    ];
}

/// Attack style selected on the current weapon.
///
/// The style shifts effective levels and, for longrange, extends reach
/// and splits the experience award.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttackStyle {
    /// +3 effective attack (melee) or accuracy focus (ranged).
    #[default]
    Accurate,
    /// +3 effective strength.
    Aggressive,
    /// +3 effective defence.
    Defensive,
    /// Faster ranged attacks, no style bonus.
    Rapid,
    /// Extended ranged reach; XP split between ranged and defence.
    Longrange,
}

impl AttackStyle {
    /// Style bonus to the effective attack level.
    pub fn attack_bonus(self) -> u32 {
        match self {
            AttackStyle::Accurate => 3,
            _ => 0,
        }
    }

    /// Style bonus to the effective strength level.
    pub fn strength_bonus(self) -> u32 {
        match self {
            AttackStyle::Aggressive => 3,
            _ => 0,
        }
    }

    /// Style bonus to the effective defence level.
    pub fn defence_bonus(self) -> u32 {
        match self {
            AttackStyle::Defensive | AttackStyle::Longrange => 3,
            _ => 0,
        }
    }
}

/// World position in tiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec2);

impl Position {
    /// Create from tile coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }

    /// Tile-space vector.
    pub fn vec(&self) -> Vec2 {
        self.0
    }
}

/// Current and maximum life points. `current <= max` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current life points.
    pub current: u32,
    /// Maximum life points.
    pub max: u32,
}

impl Health {
    /// Full health at the given maximum.
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Entity has no life points left.
    pub fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, saturating at zero. Returns the damage actually dealt.
    pub fn apply_damage(&mut self, damage: u32) -> u32 {
        let dealt = damage.min(self.current);
        self.current -= dealt;
        dealt
    }

    /// Raise the maximum, keeping current within bounds.
    pub fn set_max(&mut self, max: u32) {
        self.max = max;
        self.current = self.current.min(max);
    }
}

/// Combat skill levels. Levels are at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Melee accuracy level.
    pub attack: u32,
    /// Melee damage level.
    pub strength: u32,
    /// Defence level.
    pub defence: u32,
    /// Ranged level.
    pub ranged: u32,
    /// Magic level.
    pub magic: u32,
    /// Prayer level.
    pub prayer: u32,
    /// Hitpoints level.
    pub hitpoints: u32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            attack: 1,
            strength: 1,
            defence: 1,
            ranged: 1,
            magic: 1,
            prayer: 1,
            hitpoints: 10,
        }
    }
}

impl CombatStats {
    /// Level in a skill.
    pub fn level(&self, skill: Skill) -> u32 {
        match skill {
            Skill::Attack => self.attack,
            Skill::Strength => self.strength,
            Skill::Defence => self.defence,
            Skill::Ranged => self.ranged,
            Skill::Magic => self.magic,
            Skill::Hitpoints => self.hitpoints,
            Skill::Prayer => self.prayer,
        }
    }

    /// Set the level in a skill.
    pub fn set_level(&mut self, skill: Skill, level: u32) {
        let slot = match skill {
            Skill::Attack => &mut self.attack,
            Skill::Strength => &mut self.strength,
            Skill::Defence => &mut self.defence,
            Skill::Ranged => &mut self.ranged,
            Skill::Magic => &mut self.magic,
            Skill::Hitpoints => &mut self.hitpoints,
            Skill::Prayer => &mut self.prayer,
        };
        *slot = level.max(1);
    }
}

/// Equipment bonuses contributed by worn gear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentBonuses {
    /// Melee attack bonus.
    pub attack_melee: i32,
    /// Melee strength bonus.
    pub strength_melee: i32,
    /// Ranged attack bonus.
    pub attack_ranged: i32,
    /// Ranged strength bonus (before ammunition).
    pub strength_ranged: i32,
    /// Magic attack bonus.
    pub attack_magic: i32,
    /// Magic damage bonus in percent.
    pub magic_damage_pct: i32,
    /// Melee defence bonus.
    pub defence_melee: i32,
    /// Ranged defence bonus.
    pub defence_ranged: i32,
    /// Magic defence bonus.
    pub defence_magic: i32,
}

impl EquipmentBonuses {
    /// Offensive bonus for a style.
    pub fn attack_bonus(&self, style: CombatStyle) -> i32 {
        match style {
            CombatStyle::Melee => self.attack_melee,
            CombatStyle::Ranged => self.attack_ranged,
            CombatStyle::Magic => self.attack_magic,
        }
    }

    /// Defensive bonus against a style.
    pub fn defence_bonus(&self, style: CombatStyle) -> i32 {
        match style {
            CombatStyle::Melee => self.defence_melee,
            CombatStyle::Ranged => self.defence_ranged,
            CombatStyle::Magic => self.defence_magic,
        }
    }
}

/// Equipped weapon, ammunition and spell selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loadout {
    /// Equipped weapon item id.
    pub weapon: u32,
    /// Equipped ammunition item id (ranged weapons).
    pub ammo: Option<u32>,
    /// Selected spell id (magic weapons).
    pub spell: Option<u32>,
    /// Selected attack style.
    pub style: AttackStyle,
}

impl Loadout {
    /// Bare-handed loadout wielding the given weapon.
    pub fn with_weapon(weapon: u32) -> Self {
        Self {
            weapon,
            ammo: None,
            spell: None,
            style: AttackStyle::default(),
        }
    }
}

/// Attack cooldown tracking.
///
/// The timer is reset on each successful attack; it never decays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackTimer {
    /// Simulation time of the last successful attack (ms).
    pub last_attack_ms: u64,
    /// Cooldown applied by that attack (ms).
    pub cooldown_ms: u64,
}

impl AttackTimer {
    /// Whether the cooldown has elapsed at the given simulation time.
    pub fn ready(&self, now_ms: u64) -> bool {
        now_ms >= self.last_attack_ms + self.cooldown_ms
    }

    /// Record a successful attack.
    pub fn reset(&mut self, now_ms: u64, cooldown_ms: u64) {
        self.last_attack_ms = now_ms;
        self.cooldown_ms = cooldown_ms;
    }
}

/// Target-seeking movement state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementState {
    /// Target position in tiles.
    pub target: Vec2,
    /// Speed in tiles per second.
    pub speed: f32,
    /// Whether the entity is currently seeking its target.
    pub moving: bool,
}

/// Walking speed: one tile per 0.6 seconds.
pub const WALK_SPEED: f32 = 1.0 / 0.6;

/// Running speed: one tile per 0.3 seconds.
pub const RUN_SPEED: f32 = 1.0 / 0.3;

impl MovementState {
    /// Idle movement state at a position.
    pub fn idle_at(pos: Vec2) -> Self {
        Self {
            target: pos,
            speed: WALK_SPEED,
            moving: false,
        }
    }
}

/// Prayers currently active on an entity.
///
/// The set is replaced wholesale on each set-prayers command; combat
/// reads the strongest multiplier per boosted stat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePrayers(pub BTreeSet<u32>);

impl ActivePrayers {
    /// Activate exactly the given prayers.
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Iterate over active prayer ids.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Whether a prayer is active.
    pub fn contains(&self, id: u32) -> bool {
        self.0.contains(&id)
    }
}

/// Respawn behavior after death.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Respawn {
    /// Respawn position in tiles.
    pub spawn: Vec2,
    /// Ticks between death and respawn.
    pub delay_ticks: u64,
    /// Despawn permanently instead of respawning (one-shot NPCs).
    pub despawn: bool,
}

// =============================================================================
// TESTS
// =============================================================================
