//! Stablegrid Runner - grid orchestration
//!
//! Runs one grid against one exchange:
//!
//! - **Session**: configuration, live grid and compounding state
//! - **Orchestrator**: refresh loop, fill handling, reconciliation, compounding
//! - **Snapshot**: session persistence across restarts
//! - **Paper**: step-driven sessions against the simulated exchange
//!
//! ## Architecture
//!
//! ```text
//!               ┌─────────────────┐
//!               │   GridConfig    │  (GRID_* env / updates)
//!               └────────┬────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               GridOrchestrator               │
//! │                                              │
//! │   GridBuilder ──► Grid ◄── OrderLifecycle-   │
//! │   (levels +        │        Engine           │
//! │    allocator)      │          ▲   │          │
//! │                GridSession    │   │          │
//! └───────────────────────────────┼───┼──────────┘
//!                          fills  │   │ place / cancel
//!                                 │   ▼
//!                    ┌────────────────────────────┐
//!                    │  ExchangeClient            │
//!                    │  (live venue/SimExchange)  │
//!                    └────────────────────────────┘
//! ```

pub mod error;
pub mod orchestrator;
pub mod paper;
pub mod price_feed;
pub mod session;
pub mod snapshot;

// Re-export main types
pub use error::{Result, RunnerError};
pub use orchestrator::GridOrchestrator;
pub use paper::{PaperConfig, PaperResults, PaperSession};
pub use price_feed::{PriceWalk, PriceWalkConfig};
pub use session::{GridSession, GridStatus};
pub use snapshot::SessionSnapshot;
