use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LevelState, Side};
use crate::values::{OrderRef, Price, Quantity};

/// One price point of the grid, holding at most one resting order.
///
/// `price` and `side` are fixed when the grid is built. The order currently
/// working at this level may be on either side: every fill flips
/// `resting_side` so the next order unwinds the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    price: Price,
    /// Side assigned at grid-build time
    side: Side,
    /// Side of the order resting (or about to rest) at this level
    resting_side: Side,
    /// Order quantity in base-asset units
    size: Quantity,
    state: LevelState,
    order_ref: Option<OrderRef>,
    /// Completed buy/sell round trips at this level
    round_trips: u32,
}

impl GridLevel {
    /// Create a pending level
    pub fn new(price: Price, side: Side, size: Quantity) -> Self {
        Self {
            price,
            side,
            resting_side: side,
            size,
            state: LevelState::Pending,
            order_ref: None,
            round_trips: 0,
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn resting_side(&self) -> Side {
        self.resting_side
    }

    pub fn size(&self) -> Quantity {
        self.size
    }

    pub fn state(&self) -> LevelState {
        self.state
    }

    pub fn order_ref(&self) -> Option<OrderRef> {
        self.order_ref
    }

    pub fn round_trips(&self) -> u32 {
        self.round_trips
    }

    /// Quote-asset value of the order at this level
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }

    /// True when the resting order is the unwinding leg of a round trip
    pub fn is_reversed(&self) -> bool {
        self.resting_side != self.side
    }

    /// Resize the level (compounding or requote). Only valid without a resting order.
    pub fn set_size(&mut self, size: Quantity) {
        debug_assert!(!self.state.is_resting(), "resize with a resting order");
        self.size = size;
    }

    /// Choose the side of the next order; used when requoting a pending level.
    pub fn set_resting_side(&mut self, side: Side) {
        debug_assert!(self.state.needs_placement(), "requote outside PENDING");
        self.resting_side = side;
    }

    /// PENDING/REPLACING -> OPEN
    pub fn mark_open(&mut self, order_ref: OrderRef) {
        self.state = LevelState::Open;
        self.order_ref = Some(order_ref);
    }

    /// Back to PENDING: the order is gone and must be placed again
    pub fn mark_pending(&mut self) {
        self.state = LevelState::Pending;
        self.order_ref = None;
    }

    /// OPEN -> FILLED
    pub fn mark_filled(&mut self) {
        self.state = LevelState::Filled;
        self.order_ref = None;
    }

    /// FILLED -> REPLACING with the reversing quantity.
    ///
    /// Flips the resting side. A flip back onto the build side completes a
    /// round trip.
    pub fn begin_replacing(&mut self, quantity: Quantity) {
        self.state = LevelState::Replacing;
        self.size = quantity;
        self.resting_side = self.resting_side.opposite();
        if self.resting_side == self.side {
            self.round_trips += 1;
        }
    }

    /// OPEN -> REPLACING on the same side with a larger quantity, for a
    /// late fill that must be unwound together with the current order
    pub fn begin_regrow(&mut self, quantity: Quantity) {
        self.state = LevelState::Replacing;
        self.size = quantity;
        self.order_ref = None;
    }

    /// REPLACING -> STUCK
    pub fn mark_stuck(&mut self) {
        self.state = LevelState::Stuck;
        self.order_ref = None;
    }
}
