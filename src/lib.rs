//! # Ironvale Game Server
//!
//! Authoritative real-time simulation core for the Ironvale multiplayer world.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     IRONVALE SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D tile-space vector                      │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  data/           - Immutable static tables                   │
//! │  └── tables.rs   - Weapons, ammunition, spells, XP curve     │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── components.rs - Entity component types                  │
//! │  ├── store.rs    - Columnar world store                      │
//! │  ├── validate.rs - Command validation and rate limiting      │
//! │  ├── movement.rs - Target-seeking movement                   │
//! │  ├── formulas.rs - Combat math                               │
//! │  ├── combat.rs   - Attack resolution, deferred hits          │
//! │  ├── xp.rs       - Experience and levels                     │
//! │  ├── events.rs   - Simulation event stream                   │
//! │  └── tick.rs     - Zone state, systems, tick scheduler       │
//! │                                                              │
//! │  net/            - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server and tick loop            │
//! │  ├── protocol.rs - Wire message types                        │
//! │  ├── session.rs  - Per-connection session registry           │
//! │  └── sync.rs     - Delta state broadcasting                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/`, `data/` and `game/` modules are deterministic:
//! - No HashMap in simulation state (BTreeMap for sorted iteration)
//! - No wall-clock reads; simulation time is derived from the tick counter
//! - All randomness from a seeded Xorshift128+ stream
//!
//! Given identical seeds and identical command streams, the simulation
//! produces identical results on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod data;
pub mod game;
pub mod net;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::core::vec2::Vec2;
pub use data::tables::StaticTables;
pub use game::components::{EntityId, Skill};
pub use game::store::WorldStore;
pub use game::tick::{TickScheduler, Zone, ZoneConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Simulation ticks between state broadcasts (60 Hz sim, 10 Hz sync)
pub const BROADCAST_INTERVAL_TICKS: u64 = 6;

/// Duration of one combat round in milliseconds.
///
/// Weapon attack speeds are expressed in these rounds, independent of
/// the simulation tick rate.
pub const ATTACK_TICK_MS: u64 = 600;
