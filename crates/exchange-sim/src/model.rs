use rust_decimal::Decimal;
use stablegrid_core::{OrderKind, OrderRef, Price, Quantity, Side};
use uuid::Uuid;

/// Order resting on the simulated exchange
#[derive(Debug, Clone, PartialEq)]
pub struct SimOrder {
    pub order_ref: OrderRef,
    pub client_id: Uuid,
    pub price: Price,
    /// Unfilled quantity
    pub remaining: Quantity,
    pub side: Side,
    pub kind: OrderKind,
}

impl SimOrder {
    /// Quote locked by a buy, or base locked by a sell
    pub fn locked(&self) -> Decimal {
        match self.side {
            Side::Buy => self.remaining * self.price,
            Side::Sell => self.remaining,
        }
    }

    /// Whether the order trades against a market at `mid`.
    ///
    /// An order priced exactly at mid rests.
    pub fn crosses(&self, mid: Price) -> bool {
        match self.side {
            Side::Buy => self.price > mid,
            Side::Sell => self.price < mid,
        }
    }
}

/// Starting state of a [`crate::SimExchange`]
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub name: String,
    pub price: Price,
    pub base: Quantity,
    pub quote: Decimal,
    /// Capacity of each fill subscription channel
    pub fill_channel_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "sim".to_string(),
            price: Decimal::ONE,
            base: Decimal::ZERO,
            quote: Decimal::ZERO,
            fill_channel_capacity: 1024,
        }
    }
}
