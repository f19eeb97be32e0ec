//! Stablegrid Ports
//!
//! Port definitions (traits) for the Stablegrid grid trading system.
//! These define the boundary between grid logic and exchange connectivity.

mod error;
mod exchange;

pub use error::{ExchangeError, ExchangeResult};
pub use exchange::{ExchangeClient, PlaceOrder, RemoteOrder};
