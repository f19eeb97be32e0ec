//! Stablegrid Strategy
//!
//! Builds the target grid for a stablecoin pair:
//! - Geometric price ladder between configured bounds
//! - Capital allocation per side with a minimum-order floor
//! - Resizing of pending levels when profit is compounded
//! - Offline scenario projection
//!
//! ## Architecture
//!
//! ```text
//!   CapitalSnapshot ──┐
//!                     ▼
//!   GridConfig ──► level_count ──► generate_levels ──► CapitalAllocator
//!                                                           │
//!                                                           ▼
//!                                                      GridBuilder ──► Grid
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stablegrid_strategy::{GridBuilder, GridConfig};
//!
//! let builder = GridBuilder::new(GridConfig::default());
//! let grid = builder.build(&capital, dec!(1.00))?;
//! ```

pub mod allocator;
pub mod builder;
pub mod config;
pub mod error;
pub mod levels;
pub mod projection;

// Re-export main types
pub use allocator::{Allocation, CapitalAllocator, SideAllocation};
pub use builder::{GridBuilder, Resize};
pub use config::GridConfig;
pub use error::{GridError, Result};
pub use levels::{LevelPlan, PriceLevel, generate_levels, level_count, validate_bounds};
pub use projection::{Projection, Scenario, project};
