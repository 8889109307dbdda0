//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for flat payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::combat::AttackError;
use crate::game::components::{AttackStyle, EntityId, Skill};
use crate::game::validate::ValidationError;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Commands sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join the zone under a display name.
    Join {
        /// Display name.
        name: String,
    },

    /// Request movement toward a position.
    Move {
        /// Target X in tiles.
        x: f32,
        /// Target Y in tiles.
        y: f32,
        /// Run instead of walk.
        run: bool,
    },

    /// Stop moving and drop any attack target.
    Stop,

    /// Attack an entity.
    Attack {
        /// Target entity.
        target: EntityId,
    },

    /// Switch attack style.
    SetStyle {
        /// New style.
        style: AttackStyle,
    },

    /// Activate exactly the given prayers, replacing the current set.
    SetPrayers {
        /// Prayer ids to activate.
        prayers: Vec<u32>,
    },

    /// Zone-wide chat.
    Chat {
        /// Message text.
        text: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },

    /// Leave the zone.
    Leave,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Join accepted.
    Joined {
        /// The entity assigned to this client.
        entity: EntityId,
        /// Current server tick.
        tick: u64,
        /// Simulation tick rate.
        tick_rate: u32,
        /// World width in tiles.
        world_width: f32,
        /// World height in tiles.
        world_height: f32,
    },

    /// Move accepted.
    MoveAck {
        /// Accepted target X.
        x: f32,
        /// Accepted target Y.
        y: f32,
        /// Estimated travel time in milliseconds.
        estimated_duration_ms: u64,
    },

    /// Command rejected.
    Error {
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },

    /// World state synchronization (full snapshot or delta).
    StateSync(StateSync),

    /// An attack landed (or missed).
    CombatResult {
        /// Attacking entity.
        attacker: EntityId,
        /// Defending entity.
        defender: EntityId,
        /// Damage dealt.
        damage: u32,
        /// Whether the accuracy roll succeeded.
        hit: bool,
        /// Max hit the damage was rolled under.
        max_hit: u32,
        /// Hit probability the accuracy roll was drawn against.
        accuracy: f64,
        /// Defender's health after the hit.
        defender_health: u32,
        /// Tick the hit landed.
        tick: u64,
        /// Wall-clock time the event was relayed.
        timestamp: DateTime<Utc>,
    },

    /// Experience gained.
    XpGained {
        /// Receiving entity.
        entity: EntityId,
        /// Skill credited.
        skill: Skill,
        /// Amount granted.
        amount: u64,
        /// New total in the skill.
        total: u64,
        /// New level, when the grant leveled the skill.
        new_level: Option<u32>,
    },

    /// An entity died.
    Died {
        /// The entity that died.
        entity: EntityId,
        /// Killing entity, if any.
        killer: Option<EntityId>,
        /// Tick of death.
        tick: u64,
    },

    /// An entity respawned.
    Respawned {
        /// The entity that respawned.
        entity: EntityId,
        /// Respawn X.
        x: f32,
        /// Respawn Y.
        y: f32,
        /// Tick of respawn.
        tick: u64,
    },

    /// Another player joined the zone.
    PlayerJoined {
        /// The joining player's entity.
        entity: EntityId,
        /// Display name.
        name: String,
        /// Spawn X.
        x: f32,
        /// Spawn Y.
        y: f32,
        /// Composite combat level.
        combat_level: u32,
    },

    /// A player left the zone.
    PlayerLeft {
        /// The departing player's entity.
        entity: EntityId,
    },

    /// Zone-wide chat relay.
    Chat {
        /// Sender display name.
        from: String,
        /// Message text.
        text: String,
    },

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall-clock milliseconds.
        server_time: u64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Reason string.
        reason: String,
    },
}

/// World state snapshot or delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSync {
    /// Server tick of the sync.
    pub tick: u64,
    /// True for a full snapshot, false for a delta of changed entities.
    pub full: bool,
    /// Entity states (all entities when full, changed ones otherwise).
    pub entities: Vec<EntityView>,
    /// Entities removed since the last sync.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub removed: Vec<EntityId>,
}

/// One entity's client-visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    /// Entity identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Position X in tiles.
    pub x: f32,
    /// Position Y in tiles.
    pub y: f32,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Composite combat level.
    pub combat_level: u32,
    /// Whether the entity is seeking a movement target.
    pub moving: bool,
}

/// Machine-readable rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Target position outside the zone.
    OutOfBounds,
    /// Move exceeds the per-request distance cap.
    DistanceTooFar,
    /// Too many commands in the rate window.
    RateLimit,
    /// Attack target missing, dead, or unreachable.
    InvalidTarget,
    /// Attack cooldown has not elapsed.
    OnCooldown,
    /// No matching ammunition.
    NoAmmunition,
    /// Missing runes for the selected spell.
    InsufficientRunes,
    /// Level requirement not met.
    InsufficientLevel,
    /// Command sent before joining.
    NotJoined,
    /// Malformed message.
    InvalidInput,
    /// Internal server error.
    InternalError,
}

impl From<ValidationError> for ErrorCode {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::OutOfBounds => ErrorCode::OutOfBounds,
            ValidationError::DistanceTooFar => ErrorCode::DistanceTooFar,
            ValidationError::RateLimit => ErrorCode::RateLimit,
        }
    }
}

impl From<AttackError> for ErrorCode {
    fn from(err: AttackError) -> Self {
        match err {
            // Out-of-range reads as an unreachable target on the wire
            AttackError::InvalidTarget | AttackError::OutOfRange => ErrorCode::InvalidTarget,
            AttackError::OnCooldown => ErrorCode::OnCooldown,
            AttackError::NoAmmunition => ErrorCode::NoAmmunition,
            AttackError::InsufficientRunes => ErrorCode::InsufficientRunes,
            AttackError::InsufficientLevel => ErrorCode::InsufficientLevel,
        }
    }
}

impl ServerEvent {
    /// Build an error event from any convertible rejection.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientCommand {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerEvent {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl StateSync {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_json_roundtrip() {
        let msg = ClientCommand::Move {
            x: 12.5,
            y: 40.0,
            run: true,
        };

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"move\""));

        let parsed = ClientCommand::from_json(&json).unwrap();
        if let ClientCommand::Move { x, y, run } = parsed {
            assert_eq!(x, 12.5);
            assert_eq!(y, 40.0);
            assert!(run);
        } else {
            panic!("wrong command type");
        }
    }

    #[test]
    fn test_join_and_attack_parse() {
        let join = ClientCommand::from_json(r#"{"type":"join","name":"zezima"}"#).unwrap();
        assert!(matches!(join, ClientCommand::Join { ref name } if name == "zezima"));

        let attack = ClientCommand::from_json(r#"{"type":"attack","target":7}"#).unwrap();
        assert!(matches!(attack, ClientCommand::Attack { target } if target == EntityId(7)));

        let prayers =
            ClientCommand::from_json(r#"{"type":"set_prayers","prayers":[2,12]}"#).unwrap();
        assert!(matches!(prayers, ClientCommand::SetPrayers { ref prayers } if prayers == &[2, 12]));
    }

    #[test]
    fn test_presence_event_tags() {
        let joined = ServerEvent::PlayerJoined {
            entity: EntityId(4),
            name: "ada".to_string(),
            x: 50.0,
            y: 50.0,
            combat_level: 3,
        };
        assert!(joined.to_json().unwrap().contains("\"type\":\"player_joined\""));

        let left = ServerEvent::PlayerLeft { entity: EntityId(4) };
        assert!(left.to_json().unwrap().contains("\"type\":\"player_left\""));
    }

    #[test]
    fn test_error_code_wire_strings() {
        let cases = [
            (ErrorCode::OutOfBounds, "OUT_OF_BOUNDS"),
            (ErrorCode::DistanceTooFar, "DISTANCE_TOO_FAR"),
            (ErrorCode::RateLimit, "RATE_LIMIT"),
            (ErrorCode::InvalidTarget, "INVALID_TARGET"),
            (ErrorCode::OnCooldown, "ON_COOLDOWN"),
            (ErrorCode::NoAmmunition, "NO_AMMUNITION"),
            (ErrorCode::InsufficientRunes, "INSUFFICIENT_RUNES"),
            (ErrorCode::InsufficientLevel, "INSUFFICIENT_LEVEL"),
        ];

        for (code, expected) in cases {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{expected}\""));
        }
    }

    #[test]
    fn test_attack_error_mapping() {
        assert_eq!(
            ErrorCode::from(AttackError::OutOfRange),
            ErrorCode::InvalidTarget
        );
        assert_eq!(
            ErrorCode::from(AttackError::OnCooldown),
            ErrorCode::OnCooldown
        );
        assert_eq!(
            ErrorCode::from(ValidationError::DistanceTooFar),
            ErrorCode::DistanceTooFar
        );
    }

    #[test]
    fn test_server_event_json_roundtrip() {
        let msg = ServerEvent::XpGained {
            entity: EntityId(3),
            skill: Skill::Strength,
            amount: 48,
            total: 1210,
            new_level: Some(10),
        };

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"xp_gained\""));
        assert!(json.contains("\"skill\":\"strength\""));

        let parsed = ServerEvent::from_json(&json).unwrap();
        if let ServerEvent::XpGained { total, new_level, .. } = parsed {
            assert_eq!(total, 1210);
            assert_eq!(new_level, Some(10));
        } else {
            panic!("wrong event type");
        }
    }

    #[test]
    fn test_state_sync_binary_roundtrip() {
        let sync = StateSync {
            tick: 120,
            full: false,
            entities: vec![EntityView {
                id: EntityId(1),
                name: "goblin".to_string(),
                x: 10.0,
                y: 12.0,
                health: 5,
                max_health: 10,
                combat_level: 3,
                moving: true,
            }],
            removed: vec![EntityId(9)],
        };

        let bytes = sync.to_bytes().unwrap();
        let parsed = StateSync::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.tick, 120);
        assert_eq!(parsed.entities, sync.entities);
        assert_eq!(parsed.removed, vec![EntityId(9)]);
    }

    #[test]
    fn test_delta_sync_omits_empty_removed() {
        let sync = StateSync {
            tick: 6,
            full: true,
            entities: Vec::new(),
            removed: Vec::new(),
        };
        let json = serde_json::to_string(&ServerEvent::StateSync(sync)).unwrap();
        assert!(!json.contains("removed"));
    }
}
