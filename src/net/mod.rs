//! Network Layer
//!
//! WebSocket server for real-time client communication.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod server;
pub mod session;
pub mod sync;

pub use protocol::{ClientCommand, EntityView, ErrorCode, ServerEvent, StateSync};
pub use server::{ServerConfig, ZoneServer, ZoneServerError};
pub use session::{PlayerSession, SessionId, SessionPhase, SessionRegistry};
