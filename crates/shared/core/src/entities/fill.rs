use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::values::{OrderRef, Price, Quantity, Timestamp};

/// Execution report pushed by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_ref: OrderRef,
    /// Exchange-assigned execution id; a redelivered notification repeats it
    pub trade_id: u64,
    pub filled_size: Quantity,
    pub filled_price: Price,
    pub timestamp: Timestamp,
}

impl Fill {
    pub fn new(order_ref: OrderRef, trade_id: u64, filled_size: Quantity, filled_price: Price) -> Self {
        Self {
            order_ref,
            trade_id,
            filled_size,
            filled_price,
            timestamp: Utc::now(),
        }
    }
}
