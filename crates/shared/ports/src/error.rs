use stablegrid_core::OrderRef;
use thiserror::Error;

/// Failures reported by the exchange collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Exchange call timed out")]
    Timeout,

    #[error("Order not found: {0}")]
    NotFound(OrderRef),
}

impl ExchangeError {
    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateLimited(_) | ExchangeError::Network(_) | ExchangeError::Timeout
        )
    }
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
