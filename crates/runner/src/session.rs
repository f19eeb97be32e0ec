//! Grid Session - state owned by one orchestrator
//!
//! Holds the active configuration, the live grid (if built) and the
//! compounding bookkeeping. Everything the bot needs to resume a known grid
//! after a restart lives here.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stablegrid_core::{CompoundingState, Grid, LevelState, Price, Side, Timestamp};
use stablegrid_strategy::GridConfig;

/// Session state for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSession {
    config: GridConfig,
    grid: Option<Grid>,
    compounding: CompoundingState,
    started_at: Timestamp,
}

impl GridSession {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            grid: None,
            compounding: CompoundingState::new(),
            started_at: Utc::now(),
        }
    }

    /// Restore a session from saved grid and compounding state
    pub fn restore(config: GridConfig, grid: Option<Grid>, compounding: CompoundingState) -> Self {
        Self {
            config,
            grid,
            compounding,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut Grid> {
        self.grid.as_mut()
    }

    pub fn compounding(&self) -> &CompoundingState {
        &self.compounding
    }

    pub fn compounding_mut(&mut self) -> &mut CompoundingState {
        &mut self.compounding
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub(crate) fn set_config(&mut self, config: GridConfig) {
        self.config = config;
    }

    /// Replace the grid, returning the previous one
    pub(crate) fn replace_grid(&mut self, grid: Grid) -> Option<Grid> {
        self.grid.replace(grid)
    }

    /// True when there is no grid or its bounds/level cap differ from the config
    pub fn needs_rebuild(&self) -> bool {
        self.grid
            .as_ref()
            .is_none_or(|grid| grid.shape() != self.config.shape())
    }

    /// Report on the current state
    pub fn status(&self, last_price: Option<Price>) -> GridStatus {
        let count = |state| self.grid.as_ref().map_or(0, |g| g.count_in(state));
        let stuck_levels = self
            .grid
            .as_ref()
            .map(|g| {
                g.levels()
                    .iter()
                    .filter(|l| l.state().is_parked())
                    .map(|l| (l.price(), l.resting_side()))
                    .collect()
            })
            .unwrap_or_default();

        GridStatus {
            last_price,
            levels: self.grid.as_ref().map_or(0, Grid::len),
            pending: count(LevelState::Pending),
            open: count(LevelState::Open),
            stuck: count(LevelState::Stuck),
            resting_buys: self
                .grid
                .as_ref()
                .map_or(0, |g| g.count_resting_on(Side::Buy)),
            resting_sells: self
                .grid
                .as_ref()
                .map_or(0, |g| g.count_resting_on(Side::Sell)),
            stuck_levels,
            round_trips: self.compounding.round_trips,
            realized_since_compound: self.compounding.realized_since_last_compound,
            total_realized: self.compounding.total_realized,
            compound_count: self.compounding.compound_count,
            built_at: self.grid.as_ref().map(Grid::built_at),
        }
    }
}

/// Operator-facing snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridStatus {
    pub last_price: Option<Price>,
    pub levels: usize,
    pub pending: usize,
    pub open: usize,
    pub stuck: usize,
    pub resting_buys: usize,
    pub resting_sells: usize,
    /// Price and pending side of every STUCK level
    pub stuck_levels: Vec<(Price, Side)>,
    pub round_trips: u64,
    pub realized_since_compound: Decimal,
    pub total_realized: Decimal,
    pub compound_count: u32,
    pub built_at: Option<Timestamp>,
}
