use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity, Timestamp};

/// Balances available to the grid at one point in time.
///
/// Read-only input to sizing; balances change only through settlement on
/// the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalSnapshot {
    /// Base asset (the stablecoin being gridded)
    pub base: Quantity,
    /// Quote asset (USDC)
    pub quote: Decimal,
    pub taken_at: Timestamp,
}

impl CapitalSnapshot {
    pub fn new(base: Quantity, quote: Decimal) -> Self {
        Self {
            base,
            quote,
            taken_at: Utc::now(),
        }
    }

    /// Quote budget after withholding the reserve
    pub fn usable_quote(&self, utilization: Decimal) -> Decimal {
        self.quote * utilization
    }

    /// Capital that may be committed to orders, valued in quote
    pub fn deployable_value(&self, price: Price, utilization: Decimal) -> Decimal {
        self.usable_quote(utilization) + self.base * price
    }
}
