use async_trait::async_trait;
use log::{debug, info};
use rust_decimal::Decimal;
use stablegrid_core::{CapitalSnapshot, Fill, OrderKind, OrderRef, Price, Quantity, Side};
use stablegrid_ports::{ExchangeClient, ExchangeError, ExchangeResult, PlaceOrder, RemoteOrder};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::model::{SimConfig, SimOrder};

#[derive(Debug)]
struct SimState {
    price: Price,
    /// Free balances; funds behind resting orders are locked out of these
    base: Quantity,
    quote: Decimal,
    orders: BTreeMap<OrderRef, SimOrder>,
    by_client: HashMap<Uuid, OrderRef>,
    next_oid: u64,
    next_trade_id: u64,
    subscribers: Vec<mpsc::Sender<Fill>>,
    place_failures: VecDeque<ExchangeError>,
    cancel_failures: VecDeque<ExchangeError>,
    subscribe_failures: VecDeque<ExchangeError>,
    /// Delay applied after a placement is booked, to exercise timeouts
    place_delay: Option<Duration>,
    placed: Vec<PlaceOrder>,
    fills: Vec<Fill>,
}

/// In-memory exchange for one pair.
///
/// Orders are matched against a single mid price: moving the price through
/// a resting order fills it in full at its limit price. ALO orders that
/// would cross are rejected; GTC orders that cross fill immediately.
/// Placements are deduplicated by client id.
pub struct SimExchange {
    name: String,
    fill_channel_capacity: usize,
    state: Mutex<SimState>,
}

impl SimExchange {
    pub fn new(config: SimConfig) -> Self {
        Self {
            name: config.name,
            fill_channel_capacity: config.fill_channel_capacity,
            state: Mutex::new(SimState {
                price: config.price,
                base: config.base,
                quote: config.quote,
                orders: BTreeMap::new(),
                by_client: HashMap::new(),
                next_oid: 1,
                next_trade_id: 1,
                subscribers: Vec::new(),
                place_failures: VecDeque::new(),
                cancel_failures: VecDeque::new(),
                subscribe_failures: VecDeque::new(),
                place_delay: None,
                placed: Vec::new(),
                fills: Vec::new(),
            }),
        }
    }

    /// Exchange with `base`/`quote` balances at `price`
    pub fn with_balances(price: Price, base: Quantity, quote: Decimal) -> Self {
        Self::new(SimConfig {
            price,
            base,
            quote,
            ..Default::default()
        })
    }

    /// Move the mid price, filling every resting order it passes through
    pub async fn set_price(&self, price: Price) -> Vec<Fill> {
        let mut state = self.state.lock().await;
        state.price = price;
        let crossed: Vec<OrderRef> = state
            .orders
            .values()
            .filter(|o| o.crosses(price))
            .map(|o| o.order_ref)
            .collect();
        let fills: Vec<Fill> = crossed
            .into_iter()
            .filter_map(|order_ref| Self::execute(&mut state, order_ref, None))
            .collect();
        if !fills.is_empty() {
            debug!("Price {} filled {} orders", price, fills.len());
        }
        fills
    }

    /// Fill `quantity` of a resting order without moving the price
    pub async fn fill_partially(&self, order_ref: OrderRef, quantity: Quantity) -> Option<Fill> {
        let mut state = self.state.lock().await;
        Self::execute(&mut state, order_ref, Some(quantity))
    }

    /// Replay a fill notification that was already delivered
    pub async fn redeliver(&self, fill: Fill) {
        let mut state = self.state.lock().await;
        Self::publish(&mut state, fill);
    }

    /// Queue errors returned by the next placements, in order
    pub async fn fail_next_places(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.state.lock().await.place_failures.extend(errors);
    }

    /// Queue errors returned by the next cancels, in order
    pub async fn fail_next_cancels(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.state.lock().await.cancel_failures.extend(errors);
    }

    /// Queue errors returned by the next fill subscriptions, in order
    pub async fn fail_next_subscribes(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.state.lock().await.subscribe_failures.extend(errors);
    }

    /// Hold every placement response for `delay` after the order is booked
    pub async fn set_place_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.place_delay = delay;
    }

    /// Remove an order without notifying anyone (external cancel)
    pub async fn drop_order_silently(&self, order_ref: OrderRef) -> bool {
        let mut state = self.state.lock().await;
        match state.orders.remove(&order_ref) {
            Some(order) => {
                Self::release(&mut state, &order);
                true
            }
            None => false,
        }
    }

    /// Close every fill stream, as a websocket disconnect would
    pub async fn disconnect_fills(&self) {
        self.state.lock().await.subscribers.clear();
    }

    /// Every placement request accepted so far
    pub async fn placed_orders(&self) -> Vec<PlaceOrder> {
        self.state.lock().await.placed.clone()
    }

    /// Every fill executed so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.state.lock().await.fills.clone()
    }

    pub async fn resting_orders(&self) -> Vec<SimOrder> {
        self.state.lock().await.orders.values().cloned().collect()
    }

    pub async fn price(&self) -> Price {
        self.state.lock().await.price
    }

    /// Free plus locked balances valued in quote at the current price
    pub async fn total_value(&self) -> Decimal {
        let state = self.state.lock().await;
        let (locked_base, locked_quote) = state.orders.values().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(b, q), o| match o.side {
                Side::Buy => (b, q + o.locked()),
                Side::Sell => (b + o.locked(), q),
            },
        );
        state.quote + locked_quote + (state.base + locked_base) * state.price
    }

    fn execute(state: &mut SimState, order_ref: OrderRef, quantity: Option<Quantity>) -> Option<Fill> {
        let order = state.orders.get_mut(&order_ref)?;
        let filled = quantity.unwrap_or(order.remaining).min(order.remaining);
        order.remaining -= filled;
        let (side, price) = (order.side, order.price);
        if order.remaining.is_zero() {
            state.orders.remove(&order_ref);
        }

        // Locked funds leave; proceeds arrive free
        match side {
            Side::Buy => state.base += filled,
            Side::Sell => state.quote += filled * price,
        }

        let fill = Fill::new(order_ref, state.next_trade_id, filled, price);
        state.next_trade_id += 1;
        state.fills.push(fill.clone());
        Self::publish(state, fill.clone());
        Some(fill)
    }

    fn publish(state: &mut SimState, fill: Fill) {
        state.subscribers.retain(|tx| !tx.is_closed());
        for tx in &state.subscribers {
            if tx.try_send(fill.clone()).is_err() {
                debug!("Fill subscriber full, dropping {}", fill.order_ref);
            }
        }
    }

    fn release(state: &mut SimState, order: &SimOrder) {
        match order.side {
            Side::Buy => state.quote += order.locked(),
            Side::Sell => state.base += order.locked(),
        }
    }
}

#[async_trait]
impl ExchangeClient for SimExchange {
    async fn current_price(&self) -> ExchangeResult<Price> {
        Ok(self.state.lock().await.price)
    }

    async fn balances(&self) -> ExchangeResult<CapitalSnapshot> {
        let state = self.state.lock().await;
        Ok(CapitalSnapshot::new(state.base, state.quote))
    }

    async fn open_orders(&self) -> ExchangeResult<Vec<RemoteOrder>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .map(|o| RemoteOrder {
                order_ref: o.order_ref,
                price: o.price,
                size: o.remaining,
                side: o.side,
            })
            .collect())
    }

    async fn place_order(&self, request: PlaceOrder) -> ExchangeResult<OrderRef> {
        let (order_ref, delay) = {
            let mut state = self.state.lock().await;
            if let Some(error) = state.place_failures.pop_front() {
                return Err(error);
            }
            if let Some(existing) = state.by_client.get(&request.client_id) {
                return Ok(*existing);
            }

            let order = SimOrder {
                order_ref: OrderRef(state.next_oid),
                client_id: request.client_id,
                price: request.price,
                remaining: request.size,
                side: request.side,
                kind: request.kind,
            };
            if request.kind == OrderKind::Alo && order.crosses(state.price) {
                return Err(ExchangeError::Rejected(format!(
                    "post-only {} @ {} would cross mid {}",
                    request.side, request.price, state.price
                )));
            }
            let available = match request.side {
                Side::Buy => state.quote,
                Side::Sell => state.base,
            };
            if order.locked() > available {
                return Err(ExchangeError::Rejected(format!(
                    "insufficient balance: need {}, have {}",
                    order.locked(),
                    available
                )));
            }

            match request.side {
                Side::Buy => state.quote -= order.locked(),
                Side::Sell => state.base -= order.locked(),
            }
            state.next_oid += 1;
            let order_ref = order.order_ref;
            let crosses = order.crosses(state.price);
            state.orders.insert(order_ref, order);
            state.by_client.insert(request.client_id, order_ref);
            state.placed.push(request.clone());
            if crosses {
                info!("GTC {} @ {} crossed on entry", request.side, request.price);
                Self::execute(&mut state, order_ref, None);
            }
            (order_ref, state.place_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(order_ref)
    }

    async fn cancel_order(&self, order_ref: OrderRef) -> ExchangeResult<()> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.cancel_failures.pop_front() {
            return Err(error);
        }
        match state.orders.remove(&order_ref) {
            Some(order) => {
                Self::release(&mut state, &order);
                Ok(())
            }
            None => Err(ExchangeError::NotFound(order_ref)),
        }
    }

    async fn subscribe_fills(&self) -> ExchangeResult<mpsc::Receiver<Fill>> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.subscribe_failures.pop_front() {
            return Err(error);
        }
        let (tx, rx) = mpsc::channel(self.fill_channel_capacity);
        state.subscribers.push(tx);
        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
