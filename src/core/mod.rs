//! Core deterministic primitives.
//!
//! Everything here is platform-independent: same seed, same inputs,
//! same outputs everywhere.

pub mod rng;
pub mod vec2;

// Re-export core types
pub use rng::DeterministicRng;
pub use vec2::Vec2;
