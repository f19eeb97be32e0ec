//! Order Lifecycle Engine
//!
//! Drives each grid level through its order states:
//!
//! ```text
//!   PENDING ──ALO──► OPEN ──fill──► FILLED ──► REPLACING ──GTC──► OPEN (opposite side)
//!      ▲               │                          │
//!      └─── rejected ──┘                          └── retries exhausted ──► STUCK
//! ```
//!
//! Initial placement is post-only so a level never takes liquidity when the
//! grid is laid down. The reversing order after a fill is GTC at the same
//! price: it must rest even if the market has moved through the level.

use log::{debug, info, warn};
use rust_decimal::Decimal;
use stablegrid_core::{Fill, Grid, GridLevel, LevelState, OrderKind, OrderRef, Price, Side};
use stablegrid_ports::{ExchangeClient, ExchangeError, PlaceOrder};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Trade ids (and partially filled orders) remembered for fill routing
const HANDLED_FILL_MEMORY: usize = 4096;

/// Partially filled order whose remainder may still execute
#[derive(Debug, Clone, Copy)]
struct Retired {
    index: usize,
    price: Price,
    /// Side of the partially filled order
    side: Side,
}

/// Result of trying to place one PENDING level
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Order is resting; level is OPEN
    Placed(OrderRef),
    /// Exchange refused the order (would cross); level stays PENDING
    Rejected(String),
    /// Transient failures outlasted the retry policy; level stays PENDING
    Deferred(ExchangeError),
    /// Nothing to place (no size, on the current price, or out of bounds)
    Skipped,
}

/// Counts from one [`OrderLifecycleEngine::place_pending`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub placed: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub skipped: usize,
}

impl PlacementReport {
    fn record(&mut self, placement: &Placement) {
        match placement {
            Placement::Placed(_) => self.placed += 1,
            Placement::Rejected(_) => self.rejected += 1,
            Placement::Deferred(_) => self.deferred += 1,
            Placement::Skipped => self.skipped += 1,
        }
    }
}

/// Result of handling one fill notification
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// Duplicate or uncorrelated notification; nothing changed
    Ignored,
    /// Reversing order is resting at the same price
    Reversed {
        index: usize,
        order_ref: OrderRef,
        side: Side,
        /// Set when this fill closed a buy/sell round trip
        round_trip_profit: Option<Decimal>,
    },
}

/// Result of canceling a level's order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Order canceled; level is PENDING
    Canceled,
    /// Exchange no longer had the order; level left as it was so a late
    /// fill can still be matched
    AlreadyGone,
    /// Level had no resting order
    NotResting,
}

/// Per-level order state machine
pub struct OrderLifecycleEngine<E: ExchangeClient + ?Sized> {
    exchange: Arc<E>,
    policy: RetryPolicy,
    /// Fees on a full round trip as a fraction of notional
    fee_rate: Decimal,
    handled: HashSet<u64>,
    handled_order: VecDeque<u64>,
    retired: HashMap<OrderRef, Retired>,
    retired_order: VecDeque<OrderRef>,
}

impl<E: ExchangeClient + ?Sized> OrderLifecycleEngine<E> {
    pub fn new(exchange: Arc<E>, policy: RetryPolicy, fee_rate: Decimal) -> Self {
        Self {
            exchange,
            policy,
            fee_rate,
            handled: HashSet::new(),
            handled_order: VecDeque::new(),
            retired: HashMap::new(),
            retired_order: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn set_fee_rate(&mut self, fee_rate: Decimal) {
        self.fee_rate = fee_rate;
    }

    /// PENDING -> OPEN for every pending level, ALO.
    ///
    /// Each level is requoted against `current_price` first: a level below
    /// price rests a buy, above price a sell, and a level sitting on the
    /// price waits for the next pass.
    pub async fn place_pending(&mut self, grid: &mut Grid, current_price: Price) -> PlacementReport {
        let mut report = PlacementReport::default();
        for index in grid.indices_in(LevelState::Pending) {
            let placement = self.place_level(grid, index, current_price).await;
            report.record(&placement);
        }
        if report.placed + report.rejected + report.deferred > 0 {
            info!(
                "Placement pass: {} placed, {} rejected, {} deferred, {} skipped",
                report.placed, report.rejected, report.deferred, report.skipped
            );
        }
        report
    }

    /// Place one PENDING level post-only
    pub async fn place_level(&mut self, grid: &mut Grid, index: usize, current_price: Price) -> Placement {
        let in_bounds = grid.level(index).is_some_and(|l| grid.in_bounds(l.price()));
        let Some(level) = grid.level_mut(index) else {
            return Placement::Skipped;
        };
        if !level.state().needs_placement() || !in_bounds || level.size() <= Decimal::ZERO {
            return Placement::Skipped;
        }
        let Some(side) = Side::for_level(level.price(), current_price) else {
            debug!("Level {} sits on the current price, waiting", level.price());
            return Placement::Skipped;
        };
        if side != level.resting_side() {
            debug!(
                "Requoting level {} from {} to {}",
                level.price(),
                level.resting_side(),
                side
            );
            level.set_resting_side(side);
        }

        let request = PlaceOrder::new(level.price(), level.size(), side, OrderKind::Alo);
        let exchange = &self.exchange;
        let result = self
            .policy
            .run(
                "ALO placement",
                || exchange.place_order(request.clone()),
                ExchangeError::is_transient,
            )
            .await;

        match result {
            Ok(order_ref) => {
                debug!(
                    "Placed {} {} @ {} ({})",
                    side,
                    level.size(),
                    level.price(),
                    order_ref
                );
                level.mark_open(order_ref);
                Placement::Placed(order_ref)
            }
            Err((ExchangeError::Rejected(reason), _)) => {
                debug!("ALO {} @ {} rejected: {}", side, level.price(), reason);
                Placement::Rejected(reason)
            }
            Err((e, attempts)) => {
                warn!(
                    "Placing {} @ {} failed after {} attempts: {}",
                    side,
                    level.price(),
                    attempts,
                    e
                );
                Placement::Deferred(e)
            }
        }
    }

    /// OPEN -> FILLED -> REPLACING -> OPEN on the opposite side.
    ///
    /// Returns `Ignored` for repeated notifications (same trade id),
    /// non-positive sizes and orders the grid does not track. A partial fill
    /// cancels the unfilled remainder and reverses only the filled quantity;
    /// fills of a remainder that could not be canceled are added to that
    /// reversal.
    pub async fn handle_fill(&mut self, grid: &mut Grid, fill: &Fill) -> Result<FillOutcome> {
        if fill.filled_size <= Decimal::ZERO {
            warn!("Ignoring fill of {} for {}", fill.filled_size, fill.order_ref);
            return Ok(FillOutcome::Ignored);
        }
        if self.handled.contains(&fill.trade_id) {
            debug!("Duplicate fill {} for {} ignored", fill.trade_id, fill.order_ref);
            return Ok(FillOutcome::Ignored);
        }
        if let Some(retired) = self.retired.get(&fill.order_ref).copied() {
            self.remember(fill.trade_id);
            return self.grow_reversal(grid, retired, fill).await;
        }
        let Some(index) = grid.index_of_ref(fill.order_ref) else {
            warn!(
                "Fill for untracked order {} ({} @ {})",
                fill.order_ref, fill.filled_size, fill.filled_price
            );
            return Ok(FillOutcome::Ignored);
        };
        let ratio = grid.ratio();
        let level = grid.level_mut(index).ok_or(Error::UnknownLevel(index))?;
        if level.state() != LevelState::Open {
            return Ok(FillOutcome::Ignored);
        }
        self.remember(fill.trade_id);

        let price = level.price();
        let filled = fill.filled_size.min(level.size());
        if filled < level.size() {
            info!(
                "Partial fill at {}: {} of {}, canceling remainder",
                price,
                filled,
                level.size()
            );
            self.retire(
                fill.order_ref,
                Retired {
                    index,
                    price,
                    side: level.resting_side(),
                },
            );
            let exchange = &self.exchange;
            let cancel = self
                .policy
                .run(
                    "remainder cancel",
                    || exchange.cancel_order(fill.order_ref),
                    ExchangeError::is_transient,
                )
                .await;
            match cancel {
                Ok(()) | Err((ExchangeError::NotFound(_), _)) => {}
                Err((e, attempts)) => warn!(
                    "Remainder of {} still resting after {} attempts ({}); its fills will join the reversal",
                    fill.order_ref, attempts, e
                ),
            }
        }

        let completes_round_trip = level.is_reversed();
        level.mark_filled();
        level.begin_replacing(filled);
        let side = level.resting_side();
        info!(
            "Fill! {} {} @ {}, placing {} at same price",
            side.opposite(),
            filled,
            price,
            side
        );

        let order_ref = self.place_reversal(level).await?;
        let round_trip_profit = completes_round_trip
            .then(|| filled * price * (ratio - Decimal::ONE - self.fee_rate));
        Ok(FillOutcome::Reversed {
            index,
            order_ref,
            side,
            round_trip_profit,
        })
    }

    /// Cancel the order resting at `index`; the level becomes PENDING
    pub async fn cancel_level(&mut self, grid: &mut Grid, index: usize) -> Result<CancelOutcome> {
        let level = grid.level_mut(index).ok_or(Error::UnknownLevel(index))?;
        let Some(order_ref) = level.order_ref().filter(|_| level.state() == LevelState::Open) else {
            return Ok(CancelOutcome::NotResting);
        };

        let exchange = &self.exchange;
        let result = self
            .policy
            .run(
                "cancel",
                || exchange.cancel_order(order_ref),
                ExchangeError::is_transient,
            )
            .await;

        match result {
            Ok(()) => {
                level.mark_pending();
                Ok(CancelOutcome::Canceled)
            }
            Err((ExchangeError::NotFound(_), _)) => {
                debug!("Order {} already gone at cancel", order_ref);
                Ok(CancelOutcome::AlreadyGone)
            }
            Err((e, _)) => Err(Error::Exchange(e)),
        }
    }

    /// Fold a late fill of a partially filled order into the reversal
    /// resting at its level: cancel the reversal and re-place it at the
    /// combined quantity
    async fn grow_reversal(
        &mut self,
        grid: &mut Grid,
        retired: Retired,
        fill: &Fill,
    ) -> Result<FillOutcome> {
        let ratio = grid.ratio();
        let level = grid
            .level_mut(retired.index)
            .ok_or(Error::UnknownLevel(retired.index))?;
        let side = retired.side.opposite();
        let unreversed = Error::Unreversed {
            price: level.price(),
            side,
            quantity: fill.filled_size,
        };
        // The grid may have been rebuilt since the order was retired
        let current = level.order_ref().filter(|_| {
            level.price() == retired.price
                && level.state() == LevelState::Open
                && level.resting_side() == side
        });
        let Some(current) = current else {
            return Err(unreversed);
        };

        let exchange = &self.exchange;
        let cancel = self
            .policy
            .run(
                "reversal cancel",
                || exchange.cancel_order(current),
                ExchangeError::is_transient,
            )
            .await;
        if let Err((e, _)) = cancel {
            warn!("Could not cancel reversal {} to grow it: {}", current, e);
            return Err(unreversed);
        }

        let price = level.price();
        let quantity = level.size() + fill.filled_size;
        info!(
            "Late fill of {} {} @ {}, growing {} reversal to {}",
            fill.filled_size, retired.side, price, side, quantity
        );
        level.begin_regrow(quantity);
        let order_ref = self.place_reversal(level).await?;

        let round_trip_profit = (retired.side != level.side())
            .then(|| fill.filled_size * price * (ratio - Decimal::ONE - self.fee_rate));
        Ok(FillOutcome::Reversed {
            index: retired.index,
            order_ref,
            side,
            round_trip_profit,
        })
    }

    /// REPLACING -> OPEN with a GTC order, or STUCK once retries run out
    async fn place_reversal(&self, level: &mut GridLevel) -> Result<OrderRef> {
        let (price, side) = (level.price(), level.resting_side());
        // One client id for every attempt so a timed-out success is not doubled
        let request = PlaceOrder::new(price, level.size(), side, OrderKind::Gtc);
        let exchange = &self.exchange;
        let result = self
            .policy
            .run(
                "reversing placement",
                || exchange.place_order(request.clone()),
                |_| true,
            )
            .await;

        match result {
            Ok(order_ref) => {
                level.mark_open(order_ref);
                Ok(order_ref)
            }
            Err((last_error, attempts)) => {
                level.mark_stuck();
                Err(Error::StuckLevel {
                    price,
                    side,
                    attempts,
                    last_error,
                })
            }
        }
    }

    fn remember(&mut self, trade_id: u64) {
        if self.handled.insert(trade_id) {
            self.handled_order.push_back(trade_id);
            if self.handled_order.len() > HANDLED_FILL_MEMORY {
                if let Some(oldest) = self.handled_order.pop_front() {
                    self.handled.remove(&oldest);
                }
            }
        }
    }

    fn retire(&mut self, order_ref: OrderRef, retired: Retired) {
        if self.retired.insert(order_ref, retired).is_none() {
            self.retired_order.push_back(order_ref);
            if self.retired_order.len() > HANDLED_FILL_MEMORY {
                if let Some(oldest) = self.retired_order.pop_front() {
                    self.retired.remove(&oldest);
                }
            }
        }
    }
}
