//! Grid Builder
//!
//! Combines the level generator and the allocator into a ready-to-place
//! [`Grid`]:
//! 1. Value deployable capital and derive the level count
//! 2. Generate the geometric ladder around the current price
//! 3. Fund each side, dropping the levels farthest from price first
//! 4. Size every level

use log::{debug, info};
use rust_decimal::Decimal;
use stablegrid_core::{CapitalSnapshot, Grid, GridLevel, LevelState, Price, Side};

use crate::allocator::{Allocation, CapitalAllocator};
use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::levels::{PriceLevel, generate_levels, level_count};

/// Outcome of [`GridBuilder::resize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub allocation: Allocation,
    /// Levels left unfunded (size zero) by the capital floor
    pub unfunded: usize,
}

/// Builds and resizes grids for one configuration
#[derive(Debug, Clone)]
pub struct GridBuilder {
    config: GridConfig,
    allocator: CapitalAllocator,
}

impl GridBuilder {
    pub fn new(config: GridConfig) -> Self {
        let allocator = CapitalAllocator::from_config(&config);
        Self { config, allocator }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn allocator(&self) -> &CapitalAllocator {
        &self.allocator
    }

    /// Build a fresh grid of PENDING levels around `current_price`
    pub fn build(&self, capital: &CapitalSnapshot, current_price: Price) -> Result<Grid> {
        self.config.validate()?;
        let config = &self.config;

        let deployable = capital.deployable_value(current_price, config.usdc_utilization);
        let count = level_count(deployable, config.min_order_size, config.max_levels)?;
        let mut plan = generate_levels(
            config.lower_bound,
            config.upper_bound,
            count,
            current_price,
            config.price_decimals,
        )?;
        if count == 1 && capital.usable_quote(config.usdc_utilization) < config.min_order_size {
            // A lone level funded only by base rests as a sell on the upper bound
            plan.levels = vec![PriceLevel {
                price: config.upper_bound.round_dp(config.price_decimals),
                side: Side::Sell,
            }];
        }

        // Nearest-to-price first on each side
        let buys: Vec<&PriceLevel> = plan.buys().rev().collect();
        let sells: Vec<&PriceLevel> = plan.sells().collect();

        let allocation = self
            .allocator
            .allocate(capital, current_price, buys.len(), sells.len());
        if allocation.total_levels() == 0 {
            return Err(GridError::InsufficientCapital {
                available: deployable,
                required: config.min_order_size,
            });
        }

        let buy_levels = buys.iter().take(allocation.buy.levels).map(|l| {
            let size = self.allocator.buy_quantity(allocation.buy.per_level, l.price);
            GridLevel::new(l.price, Side::Buy, size)
        });
        let sell_size = self.allocator.sell_quantity(allocation.sell.per_level);
        let sell_levels = sells
            .iter()
            .take(allocation.sell.levels)
            .map(|l| GridLevel::new(l.price, Side::Sell, sell_size));
        let levels: Vec<GridLevel> = buy_levels
            .chain(sell_levels)
            .filter(|l| l.size() > Decimal::ZERO)
            .collect();

        let grid = Grid::new(levels, config.shape(), plan.ratio, current_price).ok_or(
            GridError::InsufficientCapital {
                available: deployable,
                required: config.min_order_size,
            },
        )?;

        info!(
            "Grid: {} levels ({} buys @ {:.2} USDC, {} sells @ {} base), ratio {:.6}, capital ${:.2}",
            grid.len(),
            allocation.buy.levels,
            allocation.buy.per_level,
            allocation.sell.levels,
            sell_size,
            plan.ratio,
            deployable
        );
        Ok(grid)
    }

    /// Recompute uniform sizes for every PENDING level of `grid`.
    ///
    /// Levels are funded by the side of their next order. Callers cancel the
    /// resting orders first so the snapshot reflects all free balances.
    pub fn resize(&self, grid: &mut Grid, capital: &CapitalSnapshot, current_price: Price) -> Resize {
        let pending = |side: Side| {
            let mut indices: Vec<usize> = grid
                .levels()
                .iter()
                .enumerate()
                .filter(|(_, l)| l.state() == LevelState::Pending && l.resting_side() == side)
                .map(|(i, _)| i)
                .collect();
            // Nearest-to-price first
            indices.sort_by_key(|&i| (grid.levels()[i].price() - current_price).abs());
            indices
        };
        let buys = pending(Side::Buy);
        let sells = pending(Side::Sell);

        let allocation = self
            .allocator
            .allocate(capital, current_price, buys.len(), sells.len());
        let sell_size = self.allocator.sell_quantity(allocation.sell.per_level);

        let mut unfunded = 0;
        for (rank, &index) in buys.iter().enumerate() {
            let Some(level) = grid.level_mut(index) else { continue };
            let size = if rank < allocation.buy.levels {
                self.allocator
                    .buy_quantity(allocation.buy.per_level, level.price())
            } else {
                unfunded += 1;
                Decimal::ZERO
            };
            level.set_size(size);
        }
        for (rank, &index) in sells.iter().enumerate() {
            let Some(level) = grid.level_mut(index) else { continue };
            let size = if rank < allocation.sell.levels {
                sell_size
            } else {
                unfunded += 1;
                Decimal::ZERO
            };
            level.set_size(size);
        }

        debug!(
            "Resized {} buys to {:.2} USDC and {} sells to {}; {} unfunded",
            allocation.buy.levels, allocation.buy.per_level, allocation.sell.levels, sell_size, unfunded
        );
        Resize {
            allocation,
            unfunded,
        }
    }
}
