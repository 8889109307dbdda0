//! Experience and Levels
//!
//! Experience is strictly additive and capped. Levels derive from the
//! experience table; hitpoints levels feed directly into maximum health.

use crate::data::tables::{level_for_xp, XP_CAP};
use crate::game::components::{EntityId, Skill};
use crate::game::events::GameEvent;
use crate::game::formulas;
use crate::game::store::WorldStore;

/// Grant experience to an entity in a skill.
///
/// Clamps at the experience cap, derives the new level, applies
/// hitpoints levels to maximum health, and emits an event when the
/// total changed. Granting zero (or anything past the cap) is a no-op.
pub fn grant_xp(
    store: &mut WorldStore,
    entity: EntityId,
    skill: Skill,
    amount: u64,
    tick: u64,
    events: &mut Vec<GameEvent>,
) {
    if amount == 0 || !store.contains(entity) {
        return;
    }

    let ledger = store.xp.entry(entity).or_default();
    let old_total = ledger.get(skill);
    let new_total = old_total.saturating_add(amount).min(XP_CAP);
    let granted = new_total - old_total;
    if granted == 0 {
        return;
    }
    ledger.set(skill, new_total);

    let old_level = level_for_xp(old_total);
    let new_level = level_for_xp(new_total);
    let leveled = new_level > old_level;

    if leveled {
        if let Some(stats) = store.stats.get_mut(&entity) {
            stats.set_level(skill, new_level);
        }
        if skill == Skill::Hitpoints {
            if let Some(hp) = store.health.get_mut(&entity) {
                hp.set_max(new_level);
            }
        }
        store.mark_dirty(entity);
    }

    events.push(GameEvent::xp_gained(
        tick,
        entity,
        skill,
        granted,
        new_total,
        leveled.then_some(new_level),
    ));
}

/// Recompute an entity's composite combat level from its current stats.
pub fn recompute_combat_level(store: &WorldStore, entity: EntityId) -> Option<u32> {
    store.stats.get(&entity).map(formulas::combat_level)
}

// =============================================================================
// TESTS
// =============================================================================
