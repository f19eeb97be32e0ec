use serde::{Deserialize, Serialize};

/// Order types the grid uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Add Liquidity Only: post-only, rejected if it would cross the book
    Alo,
    /// Good Till Canceled: rests until filled, may execute immediately
    Gtc,
}

impl OrderKind {
    /// Returns true if the exchange must reject instead of matching
    pub fn is_post_only(&self) -> bool {
        matches!(self, OrderKind::Alo)
    }
}
