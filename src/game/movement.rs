//! Target-Seeking Movement
//!
//! Entities advance toward a validated target at a fixed speed each tick.
//! Progress is monotonic: displacement per tick never exceeds `speed * dt`,
//! overshoot clamps to the target, and arrival snaps within epsilon.

use crate::core::vec2::Vec2;
use crate::game::components::{EntityId, MovementState, RUN_SPEED, WALK_SPEED};
use crate::game::store::WorldStore;
use crate::game::validate::{validate_move, ValidationError};

/// Distance at which an entity snaps onto its target and stops.
pub const SNAP_EPSILON: f32 = 0.01;

/// Acknowledgement data for an accepted move request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveAck {
    /// Accepted target X.
    pub x: f32,
    /// Accepted target Y.
    pub y: f32,
    /// Estimated travel time in milliseconds.
    pub estimated_duration_ms: u64,
}

/// Accept or reject a move request for an entity.
///
/// On success the entity's movement state starts seeking the target.
/// On failure nothing changes.
pub fn request_move(
    store: &mut WorldStore,
    entity: EntityId,
    to: Vec2,
    run: bool,
    max_distance: f32,
) -> Result<MoveAck, ValidationError> {
    let from = store.position(entity).ok_or(ValidationError::OutOfBounds)?;
    validate_move(&store.bounds, from, to, max_distance)?;

    let speed = if run { RUN_SPEED } else { WALK_SPEED };
    let distance = from.distance(to);

    store.movement.insert(
        entity,
        MovementState {
            target: to,
            speed,
            moving: true,
        },
    );

    Ok(MoveAck {
        x: to.x,
        y: to.y,
        estimated_duration_ms: (distance / speed * 1000.0) as u64,
    })
}

/// Stop an entity where it stands.
pub fn stop(store: &mut WorldStore, entity: EntityId) {
    if let Some(pos) = store.position(entity) {
        if let Some(m) = store.movement.get_mut(&entity) {
            m.target = pos;
            m.moving = false;
        }
    }
}

/// Advance every moving entity by one tick of `dt` seconds.
///
/// Dead entities do not move.
pub fn step_movement(store: &mut WorldStore, dt: f32) {
    let movers: Vec<(EntityId, MovementState)> = store
        .movement
        .iter()
        .filter(|(_, m)| m.moving)
        .map(|(id, m)| (*id, *m))
        .collect();

    for (entity, m) in movers {
        if !store.is_alive(entity) {
            continue;
        }

        let Some(current) = store.position(entity) else {
            continue;
        };

        let offset = m.target.sub(current);
        let distance = offset.length();

        if distance <= SNAP_EPSILON {
            store.set_position(entity, m.target);
            if let Some(state) = store.movement.get_mut(&entity) {
                state.moving = false;
            }
            continue;
        }

        let step = m.speed * dt;
        if step >= distance {
            // Would overshoot; clamp onto the target
            store.set_position(entity, m.target);
            if let Some(state) = store.movement.get_mut(&entity) {
                state.moving = false;
            }
        } else {
            let next = current.add(offset.normalize().scale(step));
            store.set_position(entity, next);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{Health, Position};
    use crate::game::validate::MAX_MOVE_DISTANCE;

    const DT: f32 = 1.0 / 60.0;

    fn store_with_entity(x: f32, y: f32) -> (WorldStore, EntityId) {
        let mut store = WorldStore::new(100.0, 100.0);
        let id = store.spawn();
        store.positions.insert(id, Position::new(x, y));
        store.health.insert(id, Health::full(10));
        store
            .movement
            .insert(id, MovementState::idle_at(Vec2::new(x, y)));
        (store, id)
    }

    #[test]
    fn test_request_move_accepted() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        let ack = request_move(&mut store, id, Vec2::new(14.0, 13.0), false, MAX_MOVE_DISTANCE).unwrap();
        assert_eq!(ack.x, 14.0);
        assert!(store.movement.get(&id).unwrap().moving);
        // 5 tiles at walking pace: 3 seconds
        assert_eq!(ack.estimated_duration_ms, 3000);
    }

    #[test]
    fn test_request_move_rejected_leaves_state_untouched() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        let before = store.position(id).unwrap();

        let err = request_move(&mut store, id, Vec2::new(500.0, 10.0), false, MAX_MOVE_DISTANCE);
        assert_eq!(err, Err(ValidationError::OutOfBounds));
        assert_eq!(store.position(id).unwrap(), before);
        assert!(!store.movement.get(&id).unwrap().moving);

        let err = request_move(&mut store, id, Vec2::new(40.0, 10.0), false, MAX_MOVE_DISTANCE);
        assert_eq!(err, Err(ValidationError::DistanceTooFar));
        assert!(!store.movement.get(&id).unwrap().moving);
    }

    #[test]
    fn test_step_bounded_by_speed() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        request_move(&mut store, id, Vec2::new(20.0, 10.0), false, MAX_MOVE_DISTANCE).unwrap();

        let before = store.position(id).unwrap();
        step_movement(&mut store, DT);
        let after = store.position(id).unwrap();

        let moved = before.distance(after);
        assert!(moved <= WALK_SPEED * DT + 1e-5);
        assert!(moved > 0.0);
    }

    #[test]
    fn test_monotonic_progress_and_arrival() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        let target = Vec2::new(13.0, 10.0);
        request_move(&mut store, id, target, true, MAX_MOVE_DISTANCE).unwrap();

        let mut last_remaining = store.position(id).unwrap().distance(target);
        // 3 tiles at run speed is 0.9 s; 60 ticks is plenty
        for _ in 0..60 {
            step_movement(&mut store, DT);
            let remaining = store.position(id).unwrap().distance(target);
            assert!(remaining <= last_remaining + 1e-5);
            last_remaining = remaining;
        }

        assert_eq!(store.position(id).unwrap(), target);
        assert!(!store.movement.get(&id).unwrap().moving);
    }

    #[test]
    fn test_overshoot_clamps() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        let target = Vec2::new(10.02, 10.0);
        request_move(&mut store, id, target, true, MAX_MOVE_DISTANCE).unwrap();

        // One run-speed step covers far more than 0.02 tiles
        step_movement(&mut store, DT);
        assert_eq!(store.position(id).unwrap(), target);
    }

    #[test]
    fn test_dead_entities_do_not_move() {
        let (mut store, id) = store_with_entity(10.0, 10.0);
        request_move(&mut store, id, Vec2::new(15.0, 10.0), false, MAX_MOVE_DISTANCE).unwrap();
        store.apply_damage(id, 100);

        let before = store.position(id).unwrap();
        step_movement(&mut store, DT);
        assert_eq!(store.position(id).unwrap(), before);
    }
}
