use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Timestamp;

/// Realized profit bookkeeping that drives order resizing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundingState {
    /// Profit realized since the last resize; reset on every recompute
    pub realized_since_last_compound: Decimal,
    /// Profit realized over the life of the session
    pub total_realized: Decimal,
    /// Number of completed round trips
    pub round_trips: u64,
    /// Successful resizes so far
    pub compound_count: u32,
    pub last_compound_at: Option<Timestamp>,
}

impl CompoundingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book the spread captured by one round trip
    pub fn record_round_trip(&mut self, profit: Decimal) {
        self.realized_since_last_compound += profit;
        self.total_realized += profit;
        self.round_trips += 1;
    }

    /// True when enough profit accumulated to resize orders
    pub fn should_compound(&self, threshold: Decimal) -> bool {
        self.realized_since_last_compound >= threshold
    }

    /// Reset the accumulator after a successful resize
    pub fn mark_compounded(&mut self) {
        self.realized_since_last_compound = Decimal::ZERO;
        self.compound_count += 1;
        self.last_compound_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_threshold_and_reset() {
        let mut state = CompoundingState::new();
        state.record_round_trip(dec!(0.6));
        assert!(!state.should_compound(dec!(1.0)));

        state.record_round_trip(dec!(0.4));
        assert!(state.should_compound(dec!(1.0)));

        state.mark_compounded();
        assert_eq!(state.realized_since_last_compound, Decimal::ZERO);
        assert_eq!(state.total_realized, dec!(1.0));
        assert_eq!(state.round_trips, 2);
        assert_eq!(state.compound_count, 1);
        assert!(state.last_compound_at.is_some());
    }
}
