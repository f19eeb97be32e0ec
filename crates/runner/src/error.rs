//! Runner errors

use stablegrid_ports::ExchangeError;
use stablegrid_strategy::GridError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Order lifecycle error: {0}")]
    Lifecycle(#[from] stablegrid_order_manager::Error),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
