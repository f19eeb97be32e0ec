//! Stablegrid Exchange Simulator
//!
//! In-memory [`stablegrid_ports::ExchangeClient`] for paper trading and tests.
//! One pair, one mid price, free/locked balance accounting, client-id
//! deduplication and fault injection (rejections, timeouts, dropped orders,
//! closed fill streams).

// Application layer
pub mod application;

// Order and configuration model
pub mod model;

// Re-export main types for convenience
pub use application::SimExchange;
pub use model::{SimConfig, SimOrder};
