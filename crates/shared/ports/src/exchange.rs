use async_trait::async_trait;
use stablegrid_core::{CapitalSnapshot, Fill, OrderKind, OrderRef, Price, Quantity, Side};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ExchangeResult;

/// Order placement request
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub price: Price,
    /// Quantity in base-asset units
    pub size: Quantity,
    pub side: Side,
    pub kind: OrderKind,
    /// Client id; a retried request reuses it so the exchange can deduplicate
    pub client_id: Uuid,
}

impl PlaceOrder {
    pub fn new(price: Price, size: Quantity, side: Side, kind: OrderKind) -> Self {
        Self {
            price,
            size,
            side,
            kind,
            client_id: Uuid::new_v4(),
        }
    }
}

/// Order resting on the exchange, as reported by `open_orders`
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOrder {
    pub order_ref: OrderRef,
    pub price: Price,
    pub size: Quantity,
    pub side: Side,
}

/// Port to the exchange for the traded pair
///
/// Implementations handle transport, signing and rate limiting. Calls may
/// block on I/O; callers bound them with a timeout.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Current mid price of the pair
    async fn current_price(&self) -> ExchangeResult<Price>;

    /// Base and quote balances
    async fn balances(&self) -> ExchangeResult<CapitalSnapshot>;

    /// Orders currently resting for the pair
    async fn open_orders(&self) -> ExchangeResult<Vec<RemoteOrder>>;

    /// Place a limit order
    async fn place_order(&self, order: PlaceOrder) -> ExchangeResult<OrderRef>;

    /// Cancel a resting order; `NotFound` if it is already gone
    async fn cancel_order(&self, order_ref: OrderRef) -> ExchangeResult<()>;

    /// Open a fill stream. The receiver closes on disconnect; subscribe again
    /// to resume.
    async fn subscribe_fills(&self) -> ExchangeResult<mpsc::Receiver<Fill>>;

    /// Exchange name for logging
    fn name(&self) -> &str {
        "exchange"
    }
}
