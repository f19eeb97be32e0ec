use serde::{Deserialize, Serialize};
use std::fmt;

use crate::values::Price;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side a level at `price` takes relative to `reference`.
    ///
    /// Returns `None` when the level sits exactly on the reference price.
    pub fn for_level(price: Price, reference: Price) -> Option<Self> {
        match price.cmp(&reference) {
            std::cmp::Ordering::Less => Some(Side::Buy),
            std::cmp::Ordering::Greater => Some(Side::Sell),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}
