use serde::{Deserialize, Serialize};

/// Grid level lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelState {
    /// Level exists but has no resting order
    Pending,
    /// Order is resting on the exchange
    Open,
    /// Fill observed, reversing order not yet requested
    Filled,
    /// Reversing order is being placed
    Replacing,
    /// Reversing order failed repeatedly; waits for an operator or a rebuild
    Stuck,
}

impl LevelState {
    /// Returns true if the level is expected to have an order on the exchange
    pub fn is_resting(&self) -> bool {
        matches!(self, LevelState::Open | LevelState::Replacing)
    }

    /// Returns true if the level should be (re)placed on the next cycle
    pub fn needs_placement(&self) -> bool {
        matches!(self, LevelState::Pending)
    }

    /// Returns true if automation must not touch this level
    pub fn is_parked(&self) -> bool {
        matches!(self, LevelState::Stuck)
    }
}
