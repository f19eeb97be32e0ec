//! Stablegrid Core Domain
//!
//! Pure domain types for the Stablegrid grid trading system.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    CapitalSnapshot, CompoundingState, Fill, Grid, GridLevel, GridShape, LevelState, OrderKind,
    Side,
};
pub use values::{OrderRef, Price, Quantity, Timestamp};
