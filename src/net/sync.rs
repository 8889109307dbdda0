//! Delta State Synchronization
//!
//! Builds the wire-facing view of the world. A joining client gets a
//! full snapshot; after that only entities the store marked dirty go
//! out, every few ticks, together with removals. Simulation events are
//! translated to wire events here, which is also the only place a wall
//! clock touches outbound data.

use chrono::Utc;

use crate::game::components::EntityId;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::formulas;
use crate::game::store::WorldStore;
use crate::net::protocol::{EntityView, ServerEvent, StateSync};

/// Client-visible view of one entity, if it still exists.
fn entity_view(store: &WorldStore, id: EntityId) -> Option<EntityView> {
    let position = store.position(id)?;
    let health = store.health.get(&id)?;
    let combat_level = store
        .stats
        .get(&id)
        .map(formulas::combat_level)
        .unwrap_or(3);

    Some(EntityView {
        id,
        name: store.names.get(&id).cloned().unwrap_or_default(),
        x: position.x,
        y: position.y,
        health: health.current,
        max_health: health.max,
        combat_level,
        moving: store.movement.get(&id).is_some_and(|m| m.moving),
    })
}

/// Full snapshot of every entity, for joining clients.
pub fn full_snapshot(store: &WorldStore, tick: u64) -> StateSync {
    let entities = store
        .positions
        .keys()
        .filter_map(|id| entity_view(store, *id))
        .collect();

    StateSync {
        tick,
        full: true,
        entities,
        removed: Vec::new(),
    }
}

/// Join announcement broadcast to the zone when a player spawns.
pub fn player_joined(store: &WorldStore, entity: EntityId) -> Option<ServerEvent> {
    let view = entity_view(store, entity)?;
    Some(ServerEvent::PlayerJoined {
        entity,
        name: view.name,
        x: view.x,
        y: view.y,
        combat_level: view.combat_level,
    })
}

/// Drain dirty and removed entities into a delta sync.
///
/// Returns `None` when nothing changed since the last drain.
pub fn delta_sync(store: &mut WorldStore, tick: u64) -> Option<StateSync> {
    let dirty = store.take_dirty();
    let removed = store.take_removed();

    if dirty.is_empty() && removed.is_empty() {
        return None;
    }

    // Dirty entities that were also removed have no view; the removal
    // entry alone covers them
    let entities = dirty
        .into_iter()
        .filter_map(|id| entity_view(store, id))
        .collect();

    Some(StateSync {
        tick,
        full: false,
        entities,
        removed,
    })
}

/// Translate a simulation event into its wire form.
pub fn event_to_wire(event: &GameEvent) -> ServerEvent {
    match &event.data {
        GameEventData::AttackResolved {
            attacker,
            defender,
            damage,
            hit,
            max_hit,
            accuracy,
            defender_health,
        } => ServerEvent::CombatResult {
            attacker: *attacker,
            defender: *defender,
            damage: *damage,
            hit: *hit,
            max_hit: *max_hit,
            accuracy: *accuracy,
            defender_health: *defender_health,
            tick: event.tick,
            timestamp: Utc::now(),
        },
        GameEventData::Died { entity, killer } => ServerEvent::Died {
            entity: *entity,
            killer: *killer,
            tick: event.tick,
        },
        GameEventData::Respawned { entity, position } => ServerEvent::Respawned {
            entity: *entity,
            x: position.x,
            y: position.y,
            tick: event.tick,
        },
        GameEventData::XpGained {
            entity,
            skill,
            amount,
            total,
            new_level,
        } => ServerEvent::XpGained {
            entity: *entity,
            skill: *skill,
            amount: *amount,
            total: *total,
            new_level: *new_level,
        },
    }
}

/// Whether a wire event goes to a single entity instead of the zone.
///
/// Experience is private to its owner; everything else is public.
pub fn private_recipient(event: &ServerEvent) -> Option<EntityId> {
    match event {
        ServerEvent::XpGained { entity, .. } => Some(*entity),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::components::{CombatStats, Health, Position, Skill};

    fn store_with_entities() -> (WorldStore, EntityId, EntityId) {
        let mut store = WorldStore::new(100.0, 100.0);
        let a = store.spawn();
        store.positions.insert(a, Position::new(10.0, 20.0));
        store.health.insert(a, Health::full(10));
        store.stats.insert(a, CombatStats::default());
        store.names.insert(a, "alice".to_string());

        let b = store.spawn();
        store.positions.insert(b, Position::new(30.0, 40.0));
        store.health.insert(b, Health::full(25));
        store.stats.insert(b, CombatStats::default());
        store.names.insert(b, "bob".to_string());

        // Builders below want a clean slate
        store.take_dirty();
        store.take_removed();
        (store, a, b)
    }

    #[test]
    fn test_full_snapshot_covers_all_entities() {
        let (store, a, b) = store_with_entities();
        let sync = full_snapshot(&store, 42);

        assert!(sync.full);
        assert_eq!(sync.tick, 42);
        assert_eq!(sync.entities.len(), 2);

        let view_a = sync.entities.iter().find(|v| v.id == a).unwrap();
        assert_eq!(view_a.name, "alice");
        assert_eq!(view_a.x, 10.0);
        assert_eq!(view_a.combat_level, 3);
        assert!(sync.entities.iter().any(|v| v.id == b));
    }

    #[test]
    fn test_delta_only_includes_dirty() {
        let (mut store, a, b) = store_with_entities();
        store.set_position(a, Vec2::new(11.0, 20.0));

        let sync = delta_sync(&mut store, 7).unwrap();
        assert!(!sync.full);
        assert_eq!(sync.entities.len(), 1);
        assert_eq!(sync.entities[0].id, a);
        assert!(!sync.entities.iter().any(|v| v.id == b));

        // Drained: a second delta has nothing to say
        assert!(delta_sync(&mut store, 8).is_none());
    }

    #[test]
    fn test_delta_carries_removals() {
        let (mut store, a, _b) = store_with_entities();
        store.despawn(a);

        let sync = delta_sync(&mut store, 9).unwrap();
        assert_eq!(sync.removed, vec![a]);
        // The removed entity has no view entry
        assert!(!sync.entities.iter().any(|v| v.id == a));
    }

    #[test]
    fn test_player_joined_announcement() {
        let (store, a, _b) = store_with_entities();

        match player_joined(&store, a).unwrap() {
            ServerEvent::PlayerJoined {
                entity,
                name,
                combat_level,
                ..
            } => {
                assert_eq!(entity, a);
                assert_eq!(name, "alice");
                assert_eq!(combat_level, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Announcements go to everyone
        let event = player_joined(&store, a).unwrap();
        assert_eq!(private_recipient(&event), None);

        assert!(player_joined(&store, EntityId(99)).is_none());
    }

    #[test]
    fn test_event_conversion() {
        let died = GameEvent::died(50, EntityId(2), Some(EntityId(1)));
        match event_to_wire(&died) {
            ServerEvent::Died { entity, killer, tick } => {
                assert_eq!(entity, EntityId(2));
                assert_eq!(killer, Some(EntityId(1)));
                assert_eq!(tick, 50);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let xp = GameEvent::xp_gained(51, EntityId(3), Skill::Attack, 48, 130, None);
        let wire = event_to_wire(&xp);
        assert_eq!(private_recipient(&wire), Some(EntityId(3)));

        let respawn = GameEvent::respawned(52, EntityId(4), Vec2::new(50.0, 50.0));
        assert_eq!(private_recipient(&event_to_wire(&respawn)), None);
    }
}
