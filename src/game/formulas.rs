//! Combat Math
//!
//! Pure functions shared by every combat style. All of these are
//! deterministic: integer arithmetic where the outcome feeds a roll,
//! f64 only for the final probability.

use crate::game::components::CombatStats;

/// Effective skill level after prayer and style adjustments.
///
/// `floor(level * prayer_mult) + style_bonus + 8`
pub fn effective_level(level: u32, prayer_mult: f64, style_bonus: u32) -> u32 {
    (level as f64 * prayer_mult).floor() as u32 + style_bonus + 8
}

/// Attack or defence roll: `effective_level * (equipment_bonus + 64)`.
///
/// Bonuses below -64 would turn the roll negative; clamp the factor at zero.
pub fn combat_roll(effective_level: u32, equipment_bonus: i32) -> u64 {
    let factor = (equipment_bonus + 64).max(0) as u64;
    effective_level as u64 * factor
}

/// Hit probability given the attacker's and defender's rolls.
///
/// Standard two-branch accuracy curve, clamped to `[0, 1]`.
pub fn hit_chance(attack_roll: u64, defence_roll: u64) -> f64 {
    let atk = attack_roll as f64;
    let def = defence_roll as f64;

    let chance = if attack_roll > defence_roll {
        1.0 - (def + 2.0) / (2.0 * (atk + 1.0))
    } else {
        atk / (2.0 * (def + 1.0))
    };

    chance.clamp(0.0, 1.0)
}

/// Max hit for melee and ranged attacks.
///
/// `effective_strength * (strength_bonus + 64) / 640` with integer
/// division, floored at 1 so every successful hit can deal damage.
pub fn max_hit(effective_strength: u32, strength_bonus: i32) -> u32 {
    let factor = (strength_bonus + 64).max(0) as u64;
    let hit = effective_strength as u64 * factor / 640;
    (hit as u32).max(1)
}

/// Max hit for a spell: the spell's base scaled by the magic damage bonus.
pub fn magic_max_hit(base_max_hit: u32, magic_damage_pct: i32) -> u32 {
    let scaled = base_max_hit as i64 * (100 + magic_damage_pct.max(-100) as i64) / 100;
    (scaled.max(0) as u32).max(1)
}

/// Composite combat level, clamped to `[3, 126]`.
///
/// `floor(0.25 * (def + hp + floor(prayer / 2))
///      + 0.325 * max(atk + str, floor(1.5 * ranged), floor(1.5 * magic)))`
pub fn combat_level(stats: &CombatStats) -> u32 {
    let base = 0.25 * (stats.defence + stats.hitpoints + stats.prayer / 2) as f64;

    let melee = stats.attack + stats.strength;
    let ranged = stats.ranged * 3 / 2;
    let magic = stats.magic * 3 / 2;
    let best = melee.max(ranged).max(magic);

    let level = (base + 0.325 * best as f64).floor() as u32;
    level.clamp(3, 126)
}

/// Projectile flight time for a ranged attack, in simulation milliseconds.
///
/// `min(1500, 600 + 60 * distance)` - farther shots land later, capped so
/// extreme kiting cannot stall resolution indefinitely.
pub fn ranged_travel_ms(distance_tiles: f32) -> u64 {
    let ms = 600.0 + 60.0 * distance_tiles.max(0.0);
    (ms as u64).min(1500)
}

/// Spell flight time: fixed regardless of distance.
pub const MAGIC_TRAVEL_MS: u64 = 1200;

/// Melee reach in tiles (covers diagonal adjacency).
pub const MELEE_RANGE: f32 = 1.5;

/// Ranged reach in tiles.
pub const RANGED_RANGE: f32 = 7.0;

/// Ranged reach on the longrange style.
pub const RANGED_RANGE_LONG: f32 = 10.0;

/// Magic reach in tiles.
pub const MAGIC_RANGE: f32 = 10.0;

// =============================================================================
// TESTS
// =============================================================================
