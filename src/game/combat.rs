//! Attack Resolution
//!
//! One shared pipeline for melee, ranged and magic: validate, roll
//! accuracy and damage from the zone RNG, consume resources, award
//! experience, then apply the hit - immediately for melee, after a
//! simulated flight for projectiles and spells.
//!
//! Deferred hits are queue entries keyed by due tick, never timers.
//! A hit landing on a target that died or vanished in flight is dropped;
//! ammunition and launch experience are not refunded.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::core::rng::DeterministicRng;
use crate::data::tables::{CombatStyle, ItemStack, PrayerBoost, StaticTables};
use crate::game::components::{AttackStyle, EntityId, Skill};
use crate::game::events::GameEvent;
use crate::game::formulas::{
    self, MAGIC_RANGE, MAGIC_TRAVEL_MS, MELEE_RANGE, RANGED_RANGE, RANGED_RANGE_LONG,
};
use crate::game::store::WorldStore;
use crate::game::xp::grant_xp;
use crate::game::Inventory;
use crate::ATTACK_TICK_MS;

/// Why an attack was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttackError {
    /// Target is missing, dead, or the attacker cannot act.
    #[error("target is missing or dead")]
    InvalidTarget,

    /// Attack cooldown has not elapsed.
    #[error("attack is on cooldown")]
    OnCooldown,

    /// Target is beyond the style's reach.
    #[error("target is out of range")]
    OutOfRange,

    /// Weapon or spell level requirement not met.
    #[error("level requirement not met")]
    InsufficientLevel,

    /// No matching ammunition equipped or held.
    #[error("no ammunition")]
    NoAmmunition,

    /// Missing runes for the selected spell.
    #[error("missing runes")]
    InsufficientRunes,
}

/// Simulation clock handed into combat resolution.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    /// Current tick.
    pub tick: u64,
    /// Simulation time in milliseconds (tick-derived, never wall clock).
    pub now_ms: u64,
    /// Ticks per second.
    pub tick_rate: u32,
}

impl SimClock {
    /// Ticks covered by a span of simulated milliseconds, at least one.
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        (ms * self.tick_rate as u64 / 1000).max(1)
    }
}

/// A rolled hit awaiting projectile or spell arrival.
#[derive(Debug, Clone, Copy)]
pub struct PendingHit {
    /// Tick at which the hit lands.
    pub due_tick: u64,
    /// Launch order tiebreaker.
    pub seq: u64,
    /// Attacking entity.
    pub attacker: EntityId,
    /// Defending entity.
    pub target: EntityId,
    /// Rolled damage (0 on a miss).
    pub damage: u32,
    /// Whether the accuracy roll succeeded.
    pub hit: bool,
    /// Max hit the damage was rolled under.
    pub max_hit: u32,
    /// Hit probability the roll was drawn against.
    pub accuracy: f64,
}

// Ordering and equality follow the delivery key; the rolled payload
// does not participate
impl PartialEq for PendingHit {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.seq == other.seq
    }
}

impl Eq for PendingHit {}

impl PartialOrd for PendingHit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingHit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due_tick
            .cmp(&other.due_tick)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of in-flight hits, delivered in due-tick order.
#[derive(Debug, Default)]
pub struct PendingHits {
    heap: BinaryHeap<Reverse<PendingHit>>,
    next_seq: u64,
}

impl PendingHits {
    /// Queue a hit for delivery.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        due_tick: u64,
        attacker: EntityId,
        target: EntityId,
        damage: u32,
        hit: bool,
        max_hit: u32,
        accuracy: f64,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(PendingHit {
            due_tick,
            seq,
            attacker,
            target,
            damage,
            hit,
            max_hit,
            accuracy,
        }));
    }

    /// Pop the next hit due at or before `tick`.
    pub fn pop_due(&mut self, tick: u64) -> Option<PendingHit> {
        if self.heap.peek().is_some_and(|Reverse(h)| h.due_tick <= tick) {
            self.heap.pop().map(|Reverse(h)| h)
        } else {
            None
        }
    }

    /// Drop every in-flight hit involving an entity that left the zone.
    pub fn invalidate(&mut self, entity: EntityId) {
        self.heap
            .retain(|Reverse(h)| h.attacker != entity && h.target != entity);
    }

    /// Number of hits in flight.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// No hits in flight.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop all in-flight hits.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Strongest active prayer multiplier for a boosted stat.
///
/// Prayers stack by taking the best tier, not by multiplying.
fn prayer_multiplier(
    store: &WorldStore,
    tables: &StaticTables,
    entity: EntityId,
    boost: PrayerBoost,
) -> f64 {
    store.prayers.get(&entity).map_or(1.0, |active| {
        active
            .iter()
            .filter_map(|id| tables.prayer(id))
            .filter(|p| p.boost == boost)
            .map(|p| p.multiplier)
            .fold(1.0, f64::max)
    })
}

/// Resolve an attack attempt from `attacker` against `target`.
///
/// Validation order: liveness, cooldown, range, level requirement,
/// resources. On success the cooldown resets, resources are consumed,
/// launch experience is awarded, and the hit is applied (melee) or
/// queued (ranged, magic).
#[allow(clippy::too_many_arguments)]
pub fn attempt_attack(
    store: &mut WorldStore,
    tables: &StaticTables,
    inventory: &mut dyn Inventory,
    rng: &mut DeterministicRng,
    pending: &mut PendingHits,
    events: &mut Vec<GameEvent>,
    clock: SimClock,
    attacker: EntityId,
    target: EntityId,
) -> Result<(), AttackError> {
    if !store.is_alive(attacker) || !store.is_alive(target) || attacker == target {
        return Err(AttackError::InvalidTarget);
    }

    let timer = store.attack_timers.get(&attacker).copied().unwrap_or_default();
    if !timer.ready(clock.now_ms) {
        return Err(AttackError::OnCooldown);
    }

    let loadout = store
        .loadouts
        .get(&attacker)
        .copied()
        .ok_or(AttackError::InvalidTarget)?;
    let weapon = tables
        .weapon(loadout.weapon)
        .ok_or(AttackError::InvalidTarget)?;
    let stats = *store.stats.get(&attacker).ok_or(AttackError::InvalidTarget)?;
    let bonuses = store.bonuses.get(&attacker).copied().unwrap_or_default();

    // Range gate per style
    let attacker_pos = store.position(attacker).ok_or(AttackError::InvalidTarget)?;
    let target_pos = store.position(target).ok_or(AttackError::InvalidTarget)?;
    let distance = attacker_pos.distance(target_pos);
    let reach = match weapon.style {
        CombatStyle::Melee => MELEE_RANGE,
        CombatStyle::Ranged if loadout.style == AttackStyle::Longrange => RANGED_RANGE_LONG,
        CombatStyle::Ranged => RANGED_RANGE,
        CombatStyle::Magic => MAGIC_RANGE,
    };
    if distance > reach {
        return Err(AttackError::OutOfRange);
    }

    // Weapon level requirement in the style's governing skill
    let governing = match weapon.style {
        CombatStyle::Melee => stats.attack,
        CombatStyle::Ranged => stats.ranged,
        CombatStyle::Magic => stats.magic,
    };
    if governing < weapon.level_req {
        return Err(AttackError::InsufficientLevel);
    }

    let target_stats = *store.stats.get(&target).ok_or(AttackError::InvalidTarget)?;
    let target_bonuses = store.bonuses.get(&target).copied().unwrap_or_default();
    let target_style = store
        .loadouts
        .get(&target)
        .map(|l| l.style)
        .unwrap_or_default();

    // Defender's roll against the incoming style
    let def_prayer = prayer_multiplier(store, tables, target, PrayerBoost::Defence);
    let eff_def =
        formulas::effective_level(target_stats.defence, def_prayer, target_style.defence_bonus());
    let defence_roll = formulas::combat_roll(eff_def, target_bonuses.defence_bonus(weapon.style));

    // Style-specific accuracy, max hit, resource cost and flight time
    let (attack_roll, max_hit, cost, travel_ms, xp_award) = match weapon.style {
        CombatStyle::Melee => {
            let atk_prayer = prayer_multiplier(store, tables, attacker, PrayerBoost::Attack);
            let str_prayer = prayer_multiplier(store, tables, attacker, PrayerBoost::Strength);
            let eff_atk =
                formulas::effective_level(stats.attack, atk_prayer, loadout.style.attack_bonus());
            let eff_str = formulas::effective_level(
                stats.strength,
                str_prayer,
                loadout.style.strength_bonus(),
            );
            let attack_roll = formulas::combat_roll(eff_atk, bonuses.attack_melee);
            let max_hit = formulas::max_hit(eff_str, bonuses.strength_melee);
            let skill = match loadout.style {
                AttackStyle::Aggressive => Skill::Strength,
                AttackStyle::Defensive => Skill::Defence,
                _ => Skill::Attack,
            };
            (attack_roll, max_hit, Vec::new(), None, XpAward::PerDamage(skill))
        }
        CombatStyle::Ranged => {
            let ammo_id = loadout.ammo.ok_or(AttackError::NoAmmunition)?;
            let ammo = tables.ammo(ammo_id).ok_or(AttackError::NoAmmunition)?;
            if weapon.ammo_kind != Some(ammo.kind) {
                return Err(AttackError::NoAmmunition);
            }
            let cost = vec![ItemStack::new(ammo_id, 1)];
            if !inventory.has_items(attacker, &cost) {
                return Err(AttackError::NoAmmunition);
            }

            let rng_prayer = prayer_multiplier(store, tables, attacker, PrayerBoost::Ranged);
            let eff_atk =
                formulas::effective_level(stats.ranged, rng_prayer, loadout.style.attack_bonus());
            let eff_str =
                formulas::effective_level(stats.ranged, rng_prayer, loadout.style.strength_bonus());
            let attack_roll = formulas::combat_roll(eff_atk, bonuses.attack_ranged);
            let max_hit =
                formulas::max_hit(eff_str, bonuses.strength_ranged + ammo.ranged_strength);
            let award = if loadout.style == AttackStyle::Longrange {
                XpAward::Split
            } else {
                XpAward::PerDamage(Skill::Ranged)
            };
            (
                attack_roll,
                max_hit,
                cost,
                Some(formulas::ranged_travel_ms(distance)),
                award,
            )
        }
        CombatStyle::Magic => {
            let spell_id = loadout.spell.ok_or(AttackError::InsufficientRunes)?;
            let spell = tables.spell(spell_id).ok_or(AttackError::InsufficientRunes)?;
            if stats.magic < spell.level_req {
                return Err(AttackError::InsufficientLevel);
            }
            if !inventory.has_items(attacker, &spell.runes) {
                return Err(AttackError::InsufficientRunes);
            }

            let mag_prayer = prayer_multiplier(store, tables, attacker, PrayerBoost::Magic);
            let eff_atk =
                formulas::effective_level(stats.magic, mag_prayer, loadout.style.attack_bonus());
            let attack_roll = formulas::combat_roll(eff_atk, bonuses.attack_magic);
            let max_hit = formulas::magic_max_hit(spell.base_max_hit, bonuses.magic_damage_pct);
            (
                attack_roll,
                max_hit,
                spell.runes.clone(),
                Some(MAGIC_TRAVEL_MS),
                XpAward::Fixed(Skill::Magic, spell.xp as u64),
            )
        }
    };

    // Accuracy and damage rolls, in a fixed order
    let chance = formulas::hit_chance(attack_roll, defence_roll);
    let hit = rng.roll(chance);
    let damage = if hit {
        rng.next_int_inclusive(0, max_hit)
    } else {
        0
    };

    // Consume resources; not refunded if the target dies in flight
    if !cost.is_empty() && !inventory.remove_items(attacker, &cost) {
        // has_items passed above; a failure here means the collaborator
        // mutated concurrently
        return Err(match weapon.style {
            CombatStyle::Ranged => AttackError::NoAmmunition,
            _ => AttackError::InsufficientRunes,
        });
    }

    // Launch experience
    match xp_award {
        XpAward::PerDamage(skill) => {
            grant_xp(store, attacker, skill, (4 * damage as u64).max(1), clock.tick, events);
        }
        XpAward::Split => {
            grant_xp(store, attacker, Skill::Ranged, (2 * damage as u64).max(1), clock.tick, events);
            grant_xp(store, attacker, Skill::Defence, (2 * damage as u64).max(1), clock.tick, events);
        }
        XpAward::Fixed(skill, xp) => {
            grant_xp(store, attacker, skill, xp, clock.tick, events);
        }
    }

    // Cooldown; rapid shaves one round off the weapon speed
    let rounds = if loadout.style == AttackStyle::Rapid {
        weapon.speed_rounds.saturating_sub(1).max(1)
    } else {
        weapon.speed_rounds
    };
    store
        .attack_timers
        .entry(attacker)
        .or_default()
        .reset(clock.now_ms, rounds * ATTACK_TICK_MS);

    match travel_ms {
        None => {
            apply_hit(store, clock.tick, attacker, target, damage, hit, max_hit, chance, events);
        }
        Some(ms) => {
            let due_tick = clock.tick + clock.ms_to_ticks(ms);
            pending.push(due_tick, attacker, target, damage, hit, max_hit, chance);
        }
    }

    Ok(())
}

/// Experience policy chosen by the attack style.
enum XpAward {
    PerDamage(Skill),
    Split,
    Fixed(Skill, u64),
}

/// Deliver every queued hit that is due.
///
/// Each hit revalidates its endpoints: if either side died or left the
/// zone while the projectile was in flight, the hit is dropped.
pub fn deliver_due_hits(
    store: &mut WorldStore,
    pending: &mut PendingHits,
    tick: u64,
    events: &mut Vec<GameEvent>,
) {
    while let Some(hit) = pending.pop_due(tick) {
        if !store.contains(hit.attacker) || !store.is_alive(hit.target) {
            continue;
        }
        apply_hit(
            store,
            tick,
            hit.attacker,
            hit.target,
            hit.damage,
            hit.hit,
            hit.max_hit,
            hit.accuracy,
            events,
        );
    }
}

/// Apply a resolved hit to the defender.
///
/// Emits the attack result and, on a killing blow, exactly one death
/// event plus the attacker's hitpoints award.
#[allow(clippy::too_many_arguments)]
fn apply_hit(
    store: &mut WorldStore,
    tick: u64,
    attacker: EntityId,
    target: EntityId,
    damage: u32,
    hit: bool,
    max_hit: u32,
    accuracy: f64,
    events: &mut Vec<GameEvent>,
) {
    let Some((dealt, died)) = store.apply_damage(target, damage) else {
        return;
    };
    let remaining = store.health.get(&target).map(|h| h.current).unwrap_or(0);

    events.push(GameEvent::attack_resolved(
        tick, attacker, target, dealt, hit, max_hit, accuracy, remaining,
    ));

    if died {
        store.died_at.insert(target, tick);
        store.targets.remove(&target);
        events.push(GameEvent::died(tick, target, Some(attacker)));

        // Hitpoints award for the killing blow
        grant_xp(store, attacker, Skill::Hitpoints, dealt as u64 / 4, tick, events);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tables::{AIR_RUNE, MIND_RUNE};
    use crate::game::components::{
        ActivePrayers, AttackTimer, CombatStats, Health, Loadout, MovementState, Position,
    };
    use crate::game::events::GameEventData;
    use crate::game::InMemoryInventory;
    use crate::core::vec2::Vec2;

    const CLOCK: SimClock = SimClock {
        tick: 100,
        now_ms: 100 * 1000 / 60,
        tick_rate: 60,
    };

    struct Arena {
        store: WorldStore,
        tables: StaticTables,
        inventory: InMemoryInventory,
        rng: DeterministicRng,
        pending: PendingHits,
        events: Vec<GameEvent>,
    }

    impl Arena {
        fn new() -> Self {
            Self {
                store: WorldStore::new(100.0, 100.0),
                tables: StaticTables::builtin(),
                inventory: InMemoryInventory::new(),
                rng: DeterministicRng::new(42),
                pending: PendingHits::default(),
                events: Vec::new(),
            }
        }

        fn spawn(&mut self, x: f32, y: f32, weapon: u32, hp: u32) -> EntityId {
            let id = self.store.spawn();
            self.store.positions.insert(id, Position::new(x, y));
            self.store.health.insert(id, Health::full(hp));
            self.store.stats.insert(
                id,
                CombatStats {
                    attack: 60,
                    strength: 60,
                    defence: 40,
                    ranged: 60,
                    magic: 60,
                    prayer: 1,
                    hitpoints: hp.max(10),
                },
            );
            self.store
                .loadouts
                .insert(id, Loadout::with_weapon(weapon));
            self.store.attack_timers.insert(id, AttackTimer::default());
            self.store
                .movement
                .insert(id, MovementState::idle_at(Vec2::new(x, y)));
            id
        }

        fn attack(&mut self, attacker: EntityId, target: EntityId) -> Result<(), AttackError> {
            attempt_attack(
                &mut self.store,
                &self.tables,
                &mut self.inventory,
                &mut self.rng,
                &mut self.pending,
                &mut self.events,
                CLOCK,
                attacker,
                target,
            )
        }
    }

    #[test]
    fn test_melee_attack_applies_immediately() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(11.0, 10.0, 1, 50);

        arena.attack(a, b).unwrap();

        assert!(arena.pending.is_empty());
        assert!(arena
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::AttackResolved { attacker, .. } if attacker == a)));
        // Cooldown was reset
        assert!(!arena.store.attack_timers.get(&a).unwrap().ready(CLOCK.now_ms));
    }

    #[test]
    fn test_on_cooldown_rejected() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(11.0, 10.0, 1, 50);

        arena.attack(a, b).unwrap();
        assert_eq!(arena.attack(a, b), Err(AttackError::OnCooldown));
    }

    #[test]
    fn test_melee_out_of_range() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(13.0, 10.0, 1, 50);

        assert_eq!(arena.attack(a, b), Err(AttackError::OutOfRange));
    }

    #[test]
    fn test_dead_target_invalid() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(11.0, 10.0, 1, 50);
        arena.store.apply_damage(b, 1000);

        assert_eq!(arena.attack(a, b), Err(AttackError::InvalidTarget));
    }

    #[test]
    fn test_weapon_level_requirement() {
        let mut arena = Arena::new();
        // Rune scimitar needs attack 40
        let a = arena.spawn(10.0, 10.0, 2, 50);
        let b = arena.spawn(11.0, 10.0, 1, 50);
        arena.store.stats.get_mut(&a).unwrap().attack = 30;

        assert_eq!(arena.attack(a, b), Err(AttackError::InsufficientLevel));
    }

    #[test]
    fn test_ranged_queues_and_consumes_ammo() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 3, 50);
        let b = arena.spawn(15.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().ammo = Some(882);
        arena.inventory.grant(a, 882, 3);

        arena.attack(a, b).unwrap();

        assert_eq!(arena.pending.len(), 1);
        assert_eq!(arena.inventory.count(a, 882), 2);
        // Damage has not landed yet
        assert_eq!(arena.store.health.get(&b).unwrap().current, 50);
    }

    #[test]
    fn test_ranged_without_ammo() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 3, 50);
        let b = arena.spawn(15.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().ammo = Some(882);

        assert_eq!(arena.attack(a, b), Err(AttackError::NoAmmunition));
    }

    #[test]
    fn test_ranged_reach_and_longrange() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 3, 50);
        let b = arena.spawn(19.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().ammo = Some(882);
        arena.inventory.grant(a, 882, 10);

        // 9 tiles: beyond normal reach
        assert_eq!(arena.attack(a, b), Err(AttackError::OutOfRange));

        // Longrange extends to 10 tiles and splits XP
        arena.store.loadouts.get_mut(&a).unwrap().style = AttackStyle::Longrange;
        arena.attack(a, b).unwrap();

        let skills: Vec<Skill> = arena
            .events
            .iter()
            .filter_map(|e| match &e.data {
                GameEventData::XpGained { skill, .. } => Some(*skill),
                _ => None,
            })
            .collect();
        assert!(skills.contains(&Skill::Ranged));
        assert!(skills.contains(&Skill::Defence));
    }

    #[test]
    fn test_deferred_hit_on_dead_target_dropped() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 3, 50);
        let b = arena.spawn(15.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().ammo = Some(882);
        arena.inventory.grant(a, 882, 3);

        arena.attack(a, b).unwrap();
        let ammo_after_launch = arena.inventory.count(a, 882);
        let xp_after_launch = arena.store.xp.get(&a).unwrap().get(Skill::Ranged);

        // Target dies while the arrow is in flight
        arena.store.apply_damage(b, 1000);
        arena.events.clear();

        let mut events = Vec::new();
        deliver_due_hits(&mut arena.store, &mut arena.pending, CLOCK.tick + 1000, &mut events);

        // No damage event, no second death, nothing refunded
        assert!(events.is_empty());
        assert_eq!(arena.inventory.count(a, 882), ammo_after_launch);
        assert_eq!(arena.store.xp.get(&a).unwrap().get(Skill::Ranged), xp_after_launch);
    }

    #[test]
    fn test_magic_requires_runes_and_level() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 5, 50);
        let b = arena.spawn(15.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().spell = Some(1);

        // No runes held
        assert_eq!(arena.attack(a, b), Err(AttackError::InsufficientRunes));

        // Level gate on the spell itself
        arena.inventory.grant(a, AIR_RUNE, 10);
        arena.inventory.grant(a, MIND_RUNE, 10);
        arena.store.loadouts.get_mut(&a).unwrap().spell = Some(3); // Fire Bolt, req 35
        arena.store.stats.get_mut(&a).unwrap().magic = 20;
        assert_eq!(arena.attack(a, b), Err(AttackError::InsufficientLevel));

        // Wind Strike casts, consumes runes, grants the spell's fixed XP
        arena.store.loadouts.get_mut(&a).unwrap().spell = Some(1);
        arena.attack(a, b).unwrap();
        assert_eq!(arena.inventory.count(a, AIR_RUNE), 9);
        assert_eq!(arena.inventory.count(a, MIND_RUNE), 9);
        assert_eq!(arena.store.xp.get(&a).unwrap().get(Skill::Magic), 6);
        assert_eq!(arena.pending.len(), 1);
    }

    #[test]
    fn test_single_death_event_on_kill() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(11.0, 10.0, 1, 3);

        // Swing until b dies; cooldown is bypassed by resetting the timer
        let mut deaths = 0;
        for i in 0..200 {
            arena.store.attack_timers.insert(a, AttackTimer::default());
            if arena.store.is_alive(b) {
                let clock = SimClock {
                    tick: CLOCK.tick + i,
                    now_ms: (CLOCK.tick + i) * 1000 / 60,
                    tick_rate: 60,
                };
                let _ = attempt_attack(
                    &mut arena.store,
                    &arena.tables,
                    &mut arena.inventory,
                    &mut arena.rng,
                    &mut arena.pending,
                    &mut arena.events,
                    clock,
                    a,
                    b,
                );
            }
        }
        for event in &arena.events {
            if matches!(event.data, GameEventData::Died { .. }) {
                deaths += 1;
            }
        }

        assert!(!arena.store.is_alive(b));
        assert_eq!(deaths, 1);
        assert!(arena.store.died_at.contains_key(&b));
    }

    #[test]
    fn test_invalidate_drops_in_flight_hits() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 3, 50);
        let b = arena.spawn(15.0, 10.0, 1, 50);
        arena.store.loadouts.get_mut(&a).unwrap().ammo = Some(882);
        arena.inventory.grant(a, 882, 3);

        arena.attack(a, b).unwrap();
        assert_eq!(arena.pending.len(), 1);

        // Attacker disconnects; the arrow vanishes with them
        arena.pending.invalidate(a);
        assert!(arena.pending.is_empty());
    }

    #[test]
    fn test_prayer_boosts_rolls() {
        let mut arena = Arena::new();
        let a = arena.spawn(10.0, 10.0, 1, 50);
        let b = arena.spawn(11.0, 10.0, 1, 50);

        fn last_max_hit(events: &[GameEvent]) -> u32 {
            events
                .iter()
                .rev()
                .find_map(|e| match e.data {
                    GameEventData::AttackResolved { max_hit, .. } => Some(max_hit),
                    _ => None,
                })
                .unwrap()
        }

        arena.attack(a, b).unwrap();
        // Effective strength 60 + 8, no bonuses: 68 * 64 / 640
        assert_eq!(last_max_hit(&arena.events), 6);

        // Burst of Strength and Ultimate Strength together; the strongest
        // tier (1.15) wins, it does not stack
        arena.store.attack_timers.insert(a, AttackTimer::default());
        arena.store.prayers.insert(a, ActivePrayers::from_ids([2, 12]));
        arena.events.clear();
        arena.attack(a, b).unwrap();
        // floor(60 * 1.15) + 8 = 77 -> 77 * 64 / 640
        assert_eq!(last_max_hit(&arena.events), 7);
    }

    #[test]
    fn test_pending_order_by_due_tick() {
        let mut pending = PendingHits::default();
        pending.push(50, EntityId(1), EntityId(2), 3, true, 10, 0.5);
        pending.push(40, EntityId(3), EntityId(4), 5, true, 10, 0.5);
        pending.push(40, EntityId(5), EntityId(6), 7, true, 10, 0.5);

        assert!(pending.pop_due(39).is_none());
        let first = pending.pop_due(60).unwrap();
        let second = pending.pop_due(60).unwrap();
        let third = pending.pop_due(60).unwrap();
        assert_eq!(first.attacker, EntityId(3));
        // Same due tick: launch order breaks the tie
        assert_eq!(second.attacker, EntityId(5));
        assert_eq!(third.attacker, EntityId(1));
    }
}
