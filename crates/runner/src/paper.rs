//! Paper Trading - a grid session against the simulated exchange
//!
//! Drives a [`GridOrchestrator`] step by step over a [`PriceWalk`]: every
//! step moves the mid price, every fill it produces is handled before the
//! next step, and a refresh runs every `refresh_every` steps. No wall-clock
//! time is involved, so a seeded session is reproducible.

use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stablegrid_core::{Price, Quantity};
use stablegrid_exchange_sim::SimExchange;
use stablegrid_order_manager::RetryPolicy;
use stablegrid_ports::ExchangeClient;
use stablegrid_strategy::GridConfig;
use std::sync::Arc;

use crate::error::Result;
use crate::orchestrator::GridOrchestrator;
use crate::price_feed::{PriceWalk, PriceWalkConfig};
use crate::session::{GridSession, GridStatus};

/// Paper session configuration
#[derive(Debug, Clone)]
pub struct PaperConfig {
    pub grid: GridConfig,
    pub walk: PriceWalkConfig,
    /// Starting base balance
    pub base: Quantity,
    /// Starting quote balance
    pub quote: Decimal,
    /// Price steps to simulate
    pub steps: usize,
    /// Steps between refresh cycles
    pub refresh_every: usize,
    /// Seed for the price walk; random when `None`
    pub seed: Option<u64>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            walk: PriceWalkConfig::default(),
            base: dec!(1000),
            quote: dec!(1000),
            steps: 2_000,
            refresh_every: 50,
            seed: None,
        }
    }
}

/// Paper session results
#[derive(Debug, Clone)]
pub struct PaperResults {
    pub steps: usize,
    pub fills: usize,
    pub final_price: Price,
    /// Portfolio value in quote at the start price
    pub start_value: Decimal,
    /// Portfolio value in quote at the final price
    pub end_value: Decimal,
    /// Starting balances valued at the final price
    pub hold_value: Decimal,
    pub status: GridStatus,
}

impl PaperResults {
    /// Grid value minus buy-and-hold value
    pub fn edge_over_hold(&self) -> Decimal {
        self.end_value - self.hold_value
    }
}

/// One paper trading run
pub struct PaperSession {
    config: PaperConfig,
}

impl PaperSession {
    pub fn new(config: PaperConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<PaperResults> {
        let config = self.config;
        let mut walk = match config.seed {
            Some(seed) => PriceWalk::with_seed(config.walk.clone(), seed),
            None => PriceWalk::new(config.walk.clone()),
        };
        let exchange = Arc::new(SimExchange::with_balances(
            walk.price(),
            config.base,
            config.quote,
        ));
        let start_value = exchange.total_value().await;

        let mut orchestrator = GridOrchestrator::new(
            exchange.clone(),
            GridSession::new(config.grid.clone()),
            RetryPolicy::no_retry(),
        )?;
        let mut fills = exchange.subscribe_fills().await?;
        orchestrator.refresh_cycle().await?;

        info!(
            "Paper session: {} steps from {} with {} base / {} quote",
            config.steps,
            walk.price(),
            config.base,
            config.quote
        );

        let mut fill_count = 0;
        for step in 1..=config.steps {
            let price = walk.next_price();
            exchange.set_price(price).await;

            // Reversals may cross and fill on entry; drain until quiet
            while let Ok(fill) = fills.try_recv() {
                fill_count += 1;
                if let Err(e) = orchestrator.handle_fill(fill).await {
                    debug!("Step {}: {}", step, e);
                }
            }
            if step % config.refresh_every.max(1) == 0 {
                orchestrator.refresh_cycle().await?;
            }
        }

        let final_price = walk.price();
        let end_value = exchange.total_value().await;
        let hold_value = config.quote + config.base * final_price;
        let status = orchestrator.status();

        info!(
            "Paper session done: {} fills, {} round trips, {:.4} realized, value {:.2} -> {:.2} (hold {:.2})",
            fill_count,
            status.round_trips,
            status.total_realized,
            start_value,
            end_value,
            hold_value
        );

        Ok(PaperResults {
            steps: config.steps,
            fills: fill_count,
            final_price,
            start_value,
            end_value,
            hold_value,
            status,
        })
    }
}
