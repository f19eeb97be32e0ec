//! Grid Orchestrator - the refresh loop
//!
//! Single writer over a [`GridSession`]. One task runs both the periodic
//! refresh and fill handling, so no two transitions ever race on a level:
//!
//! ```text
//!   shutdown (watch) ──┐
//!   fills (mpsc) ──────┼──► select! (biased) ──► handle_fill / refresh_cycle
//!   config updates ────┤
//!   refresh interval ──┘
//! ```
//!
//! Each refresh:
//! 1. Fetch price and balances
//! 2. Build the grid when there is none or its shape changed; otherwise
//!    reconcile tracked orders against the exchange
//! 3. Place every PENDING level
//! 4. Resize and reissue orders once enough profit has been realized

use log::{debug, error, info, warn};
use stablegrid_core::{CapitalSnapshot, Fill, Grid, LevelState, OrderRef, Price, Side};
use stablegrid_order_manager::{FillOutcome, OrderLifecycleEngine, RetryPolicy};
use stablegrid_ports::{ExchangeClient, ExchangeError, ExchangeResult, RemoteOrder};
use stablegrid_strategy::{GridBuilder, GridConfig, GridError};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::error::{Result, RunnerError};
use crate::session::{GridSession, GridStatus};
use crate::snapshot;

/// Drives one grid against one exchange
pub struct GridOrchestrator<E: ExchangeClient + ?Sized> {
    exchange: Arc<E>,
    engine: OrderLifecycleEngine<E>,
    builder: GridBuilder,
    session: GridSession,
    last_price: Option<Price>,
    /// Configuration swaps applied between cycles
    config_updates: Option<mpsc::Receiver<GridConfig>>,
}

impl<E: ExchangeClient + ?Sized> GridOrchestrator<E> {
    /// Create an orchestrator over `session`; fails on an invalid configuration
    pub fn new(exchange: Arc<E>, session: GridSession, policy: RetryPolicy) -> Result<Self> {
        session.config().validate()?;
        let engine = OrderLifecycleEngine::new(
            exchange.clone(),
            policy,
            session.config().round_trip_fee_rate,
        );
        Ok(Self {
            exchange,
            engine,
            builder: GridBuilder::new(session.config().clone()),
            session,
            last_price: None,
            config_updates: None,
        })
    }

    /// Receive configuration swaps while [`run`](Self::run) is active
    pub fn with_config_updates(mut self, updates: mpsc::Receiver<GridConfig>) -> Self {
        self.config_updates = Some(updates);
        self
    }

    pub fn session(&self) -> &GridSession {
        &self.session
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.session.grid()
    }

    pub fn status(&self) -> GridStatus {
        self.session.status(self.last_price)
    }

    /// Swap the configuration. A new shape rebuilds the grid on the next
    /// refresh; other fields apply immediately.
    pub fn update_config(&mut self, config: GridConfig) -> Result<()> {
        config.validate()?;
        if config.shape() != self.session.config().shape() {
            info!(
                "Grid shape changed to {} - {} x {}, rebuilding on next refresh",
                config.lower_bound, config.upper_bound, config.max_levels
            );
        }
        self.engine.set_fee_rate(config.round_trip_fee_rate);
        self.builder = GridBuilder::new(config.clone());
        self.session.set_config(config);
        Ok(())
    }

    /// One refresh: build or reconcile, place pending levels, compound
    pub async fn refresh_cycle(&mut self) -> Result<()> {
        let price = fetch(self.engine.policy(), "price", || self.exchange.current_price()).await?;
        self.last_price = Some(price);

        if self.session.needs_rebuild() {
            self.rebuild(price).await?;
        } else {
            self.reconcile(price).await?;
        }
        self.compound(price).await?;

        let status = self.status();
        debug!(
            "Refresh @ {}: {} open ({} buys / {} sells), {} pending, {} stuck",
            price,
            status.open,
            status.resting_buys,
            status.resting_sells,
            status.pending,
            status.stuck
        );
        Ok(())
    }

    /// Route one fill notification through the lifecycle engine and book
    /// any completed round trip
    pub async fn handle_fill(&mut self, fill: Fill) -> Result<FillOutcome> {
        let Some(grid) = self.session.grid_mut() else {
            debug!("Fill for {} before any grid was built", fill.order_ref);
            return Ok(FillOutcome::Ignored);
        };
        let outcome = self.engine.handle_fill(grid, &fill).await?;

        if let FillOutcome::Reversed {
            round_trip_profit: Some(profit),
            ..
        } = &outcome
        {
            let compounding = self.session.compounding_mut();
            compounding.record_round_trip(*profit);
            info!(
                "Round trip +{:.6} USDC ({:.6} since last resize, {} total)",
                profit, compounding.realized_since_last_compound, compounding.round_trips
            );
        }
        Ok(outcome)
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// Fills are handled as they arrive; queued fills are always drained
    /// before a refresh reads state. A lost fill stream is resubscribed, on
    /// the next refresh if the exchange is unreachable. Stops early with an
    /// error only when the first grid cannot be funded. Resting orders are
    /// left on the exchange and the session is saved on every exit when a
    /// state path is configured.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Grid orchestrator started on {} (refresh every {}s)",
            self.exchange.name(),
            self.session.config().refresh_secs
        );
        let result = self.event_loop(shutdown).await;
        let saved = self.shutdown();
        result.and(saved)
    }

    /// Save the session (if configured) and report what stays resting
    pub fn shutdown(&self) -> Result<()> {
        let resting = self.grid().map_or(0, |g| g.resting_refs().len());
        info!("Shutting down, leaving {} orders resting", resting);
        if let Some(path) = &self.session.config().state_path {
            snapshot::save(path, &self.session)?;
        }
        Ok(())
    }

    async fn event_loop(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut fills = self.subscribe().await;
        let mut refresh_secs = self.session.config().refresh_secs;
        let mut refresh = refresh_ticker(self.session.config(), Instant::now());

        while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                fill = async {
                    match &mut fills {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => match fill {
                    Some(fill) => self.on_fill(fill).await,
                    None => {
                        warn!("Fill stream closed, resubscribing");
                        fills = self.subscribe().await;
                    }
                },

                update = async {
                    match &mut self.config_updates {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => match update {
                    Some(config) => {
                        if let Err(e) = self.update_config(config) {
                            error!("Rejected configuration update: {}", e);
                        }
                    }
                    None => self.config_updates = None,
                },

                _ = refresh.tick() => {
                    if fills.is_none() {
                        fills = self.subscribe().await;
                    }
                    if let Some(rx) = &mut fills {
                        while let Ok(fill) = rx.try_recv() {
                            self.on_fill(fill).await;
                        }
                    }

                    let first_build = self.session.grid().is_none();
                    match self.refresh_cycle().await {
                        Ok(()) => {}
                        Err(RunnerError::Grid(e @ GridError::InsufficientCapital { .. }))
                            if first_build =>
                        {
                            error!("Cannot fund the grid: {}", e);
                            return Err(e.into());
                        }
                        Err(e) => error!("Refresh failed: {}", e),
                    }
                }
            }

            let configured = self.session.config().refresh_secs;
            if configured != refresh_secs {
                refresh_secs = configured;
                let period = self.session.config().refresh_interval();
                refresh = refresh_ticker(self.session.config(), Instant::now() + period);
            }
        }
        Ok(())
    }

    async fn on_fill(&mut self, fill: Fill) {
        if let Err(e) = self.handle_fill(fill).await {
            error!("{}", e);
        }
    }

    /// Open a fill stream; `None` when the exchange stays unreachable
    async fn subscribe(&self) -> Option<mpsc::Receiver<Fill>> {
        let subscription = fetch(self.engine.policy(), "fill subscription", || {
            self.exchange.subscribe_fills()
        })
        .await;
        match subscription {
            Ok(rx) => Some(rx),
            Err(e) => {
                error!("Fill subscription failed, retrying on the next refresh: {}", e);
                None
            }
        }
    }

    /// Replace the grid: cancel what the old one tracked, size a new one from
    /// free plus locked balances, adopt matching remote orders, place the rest
    async fn rebuild(&mut self, price: Price) -> Result<()> {
        if let Some(grid) = self.session.grid_mut() {
            info!("Tearing down {} levels for rebuild", grid.len());
            for index in 0..grid.len() {
                if let Err(e) = self.engine.cancel_level(grid, index).await {
                    warn!("Cancel during rebuild failed: {}", e);
                }
            }
        }

        let policy = self.engine.policy();
        let remote = fetch(policy, "open orders", || self.exchange.open_orders()).await?;
        let free = fetch(policy, "balances", || self.exchange.balances()).await?;
        let capital = with_locked(free, &remote);

        let mut grid = self.builder.build(&capital, price)?;
        let adopted = self.adopt(&mut grid, &remote).await;
        let report = self.engine.place_pending(&mut grid, price).await;
        info!(
            "Grid built @ {}: {} levels, {} adopted, {} placed, {} pending",
            price,
            grid.len(),
            adopted,
            report.placed,
            grid.count_in(LevelState::Pending)
        );
        self.session.replace_grid(grid);
        Ok(())
    }

    /// Mark remote orders that sit on a grid level with the expected side as
    /// that level's order; cancel every other remote order
    async fn adopt(&self, grid: &mut Grid, remote: &[RemoteOrder]) -> usize {
        let mut adopted = 0;
        for order in remote {
            let slot = grid
                .index_of_price(order.price)
                .and_then(|index| grid.level_mut(index))
                .filter(|l| l.state() == LevelState::Pending && l.resting_side() == order.side);
            match slot {
                Some(level) => {
                    level.set_size(order.size);
                    level.mark_open(order.order_ref);
                    adopted += 1;
                }
                None => {
                    info!(
                        "Canceling stray {} {} @ {} ({})",
                        order.side, order.size, order.price, order.order_ref
                    );
                    let cancel = self.exchange.cancel_order(order.order_ref);
                    match self.engine.policy().call(cancel).await {
                        Ok(()) | Err(ExchangeError::NotFound(_)) => {}
                        Err(e) => warn!("Cancel of stray {} failed: {}", order.order_ref, e),
                    }
                }
            }
        }
        adopted
    }

    /// Re-place levels whose order vanished without a fill, then place
    /// everything PENDING
    async fn reconcile(&mut self, price: Price) -> Result<()> {
        let remote = fetch(self.engine.policy(), "open orders", || {
            self.exchange.open_orders()
        })
        .await?;
        let live: HashSet<OrderRef> = remote.iter().map(|o| o.order_ref).collect();
        let Some(grid) = self.session.grid_mut() else {
            return Ok(());
        };

        for level in grid.levels_mut() {
            let vanished = level.state() == LevelState::Open
                && level.order_ref().is_some_and(|r| !live.contains(&r));
            if vanished {
                warn!(
                    "{} order at {} vanished with no fill observed, re-placing",
                    level.resting_side(),
                    level.price()
                );
                level.mark_pending();
            }
        }
        let untracked = remote
            .iter()
            .filter(|o| grid.index_of_ref(o.order_ref).is_none())
            .count();
        if untracked > 0 {
            warn!("{} resting orders are not tracked by the grid", untracked);
        }

        self.engine.place_pending(grid, price).await;
        Ok(())
    }

    /// Cancel every open level, resize from fresh balances and reissue
    async fn compound(&mut self, price: Price) -> Result<()> {
        let threshold = self.session.config().compound_threshold;
        let realized = self.session.compounding().realized_since_last_compound;
        if !self.session.compounding().should_compound(threshold) {
            return Ok(());
        }
        let Some(grid) = self.session.grid_mut() else {
            return Ok(());
        };
        info!(
            "Compounding {:.6} USDC of realized profit into order sizes",
            realized
        );

        for index in grid.indices_in(LevelState::Open) {
            if let Err(e) = self.engine.cancel_level(grid, index).await {
                warn!("Cancel during compounding failed: {}", e);
            }
        }
        let capital = fetch(self.engine.policy(), "balances", || self.exchange.balances()).await?;
        let resize = self.builder.resize(grid, &capital, price);
        let report = self.engine.place_pending(grid, price).await;
        info!(
            "Resized to {:.2} USDC per buy and {} per sell; {} reissued, {} unfunded",
            resize.allocation.buy.per_level,
            self.builder.allocator().sell_quantity(resize.allocation.sell.per_level),
            report.placed,
            resize.unfunded
        );

        self.session.compounding_mut().mark_compounded();
        Ok(())
    }
}

/// Exchange read with transient errors retried per `policy`
async fn fetch<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    policy
        .run(label, op, ExchangeError::is_transient)
        .await
        .map_err(|(e, _)| e.into())
}

/// Free balances plus the funds locked in `orders`
fn with_locked(free: CapitalSnapshot, orders: &[RemoteOrder]) -> CapitalSnapshot {
    let (base, quote) = orders
        .iter()
        .fold((free.base, free.quote), |(base, quote), o| match o.side {
            Side::Buy => (base, quote + o.size * o.price),
            Side::Sell => (base + o.size, quote),
        });
    CapitalSnapshot::new(base, quote)
}

fn refresh_ticker(config: &GridConfig, start: Instant) -> Interval {
    let mut ticker = interval_at(start, config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_locked_funds_count_toward_capital() {
        let free = CapitalSnapshot::new(dec!(50), dec!(40));
        let orders = vec![
            RemoteOrder {
                order_ref: OrderRef(1),
                price: dec!(0.99),
                size: dec!(10),
                side: Side::Buy,
            },
            RemoteOrder {
                order_ref: OrderRef(2),
                price: dec!(1.01),
                size: dec!(20),
                side: Side::Sell,
            },
        ];

        let capital = with_locked(free, &orders);

        assert_eq!(capital.base, dec!(70));
        assert_eq!(capital.quote, dec!(49.9));
    }
}
