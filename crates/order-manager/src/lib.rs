//! Stablegrid Order Manager
//!
//! Owns the per-level order lifecycle of a grid:
//! - **Placement**: post-only (ALO) orders for pending levels, requoted
//!   against the current price
//! - **Fill reversal**: a GTC order at the same price on the opposite side
//!   for every fill, with bounded retries
//! - **Cancellation**: used by resizes and rebuilds
//!
//! ## Architecture
//!
//! ```text
//!  GridOrchestrator ──► OrderLifecycleEngine ──► ExchangeClient
//!         ▲                   │    ▲
//!         │ FillOutcome       │    │ Fill
//!         └───────────────────┘    └──── fill stream
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stablegrid_order_manager::{OrderLifecycleEngine, RetryPolicy};
//!
//! let mut engine = OrderLifecycleEngine::new(exchange, RetryPolicy::default(), dec!(0.0008));
//! engine.place_pending(&mut grid, price).await;
//! let outcome = engine.handle_fill(&mut grid, &fill).await?;
//! ```

pub mod error;
pub mod lifecycle;
pub mod retry;

// Re-export main types
pub use error::{Error, Result};
pub use lifecycle::{CancelOutcome, FillOutcome, OrderLifecycleEngine, Placement, PlacementReport};
pub use retry::RetryPolicy;
