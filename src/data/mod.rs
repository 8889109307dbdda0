//! Immutable static game data.
//!
//! Built once at startup and shared read-only with the simulation.

pub mod tables;

pub use tables::{AmmoDef, AmmoKind, CombatStyle, ItemStack, SpellDef, StaticTables, WeaponDef};
