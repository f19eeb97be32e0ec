//! Scenario Projection
//!
//! Offline what-if for a set of balances: how many levels the capital
//! funds, the spread each step captures and the expected profit of one
//! round trip after fees. No exchange access.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stablegrid_core::{CapitalSnapshot, Price};

use crate::config::GridConfig;
use crate::error::Result;
use crate::levels::{generate_levels, level_count};

/// Grids with fewer levels than this cover the range too sparsely
pub const MIN_READY_LEVELS: usize = 10;

/// Balances and price to project
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub quote: Decimal,
    pub base: Decimal,
    pub mid: Price,
}

impl Scenario {
    pub fn new(name: impl Into<String>, quote: Decimal, base: Decimal, mid: Price) -> Self {
        Self {
            name: name.into(),
            quote,
            base,
            mid,
        }
    }

    /// Reference scenarios for the default FEUSD range
    pub fn reference_set() -> Vec<Scenario> {
        vec![
            Scenario::new("1500 FEUSD only @ 1.02", dec!(0), dec!(1500), dec!(1.02)),
            Scenario::new("1500 USDC only @ 0.99", dec!(1500), dec!(0), dec!(0.99)),
            Scenario::new("100 FEUSD + 10 USDC", dec!(10), dec!(100), dec!(1.00)),
            Scenario::new("Balanced $2000 @ 1.00", dec!(1000), dec!(1000), dec!(1.00)),
            Scenario::new("Minimum viable $1100", dec!(550), dec!(550), dec!(1.00)),
            Scenario::new("Low capital $500", dec!(250), dec!(250), dec!(1.00)),
        ]
    }
}

/// Projected grid for a [`Scenario`]
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Quote after reserve plus base valued at mid
    pub deployable: Decimal,
    pub levels: usize,
    pub buy_levels: usize,
    pub sell_levels: usize,
    /// Spread of one grid step, in percent
    pub step_spread_pct: Decimal,
    /// Base quantity per order, sized against the middle of the range
    pub order_size: Decimal,
    /// Expected profit of one round trip, net of fees
    pub profit_per_round_trip: Decimal,
}

impl Projection {
    pub fn is_ready(&self) -> bool {
        self.levels >= MIN_READY_LEVELS
    }
}

/// Project `scenario` under `config`.
///
/// Fails with `InsufficientCapital` when not even one level is fundable.
pub fn project(config: &GridConfig, scenario: &Scenario) -> Result<Projection> {
    let capital = CapitalSnapshot::new(scenario.base, scenario.quote);
    let deployable = capital.deployable_value(scenario.mid, config.usdc_utilization);
    let levels = level_count(deployable, config.min_order_size, config.max_levels)?;
    let plan = generate_levels(
        config.lower_bound,
        config.upper_bound,
        levels,
        scenario.mid,
        config.price_decimals,
    )?;

    let step_spread = plan.step_spread();
    let range_mid = (config.lower_bound + config.upper_bound) / dec!(2);
    let order_size = (deployable / Decimal::from(levels) / range_mid).round_dp(2);
    let profit_per_round_trip =
        order_size * scenario.mid * (step_spread - config.round_trip_fee_rate);

    Ok(Projection {
        deployable,
        levels,
        buy_levels: plan.buys().count(),
        sell_levels: plan.sells().count(),
        step_spread_pct: (step_spread * dec!(100)).round_dp(3),
        order_size,
        profit_per_round_trip: profit_per_round_trip.round_dp(4),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;

    #[test]
    fn test_minimum_viable_capital_funds_full_grid() {
        let config = GridConfig::default();
        let scenario = Scenario::new("min", dec!(550), dec!(550), dec!(1.00));
        let projection = project(&config, &scenario).unwrap();

        // 495 usable USDC + 550 FEUSD
        assert_eq!(projection.deployable, dec!(1045));
        assert_eq!(projection.levels, 95);
        assert!(projection.is_ready());
        assert!(projection.profit_per_round_trip > Decimal::ZERO);
    }

    #[test]
    fn test_low_capital_widens_spread() {
        let config = GridConfig::default();
        let full = project(&config, &Scenario::new("full", dec!(1000), dec!(1000), dec!(1.00))).unwrap();
        let low = project(&config, &Scenario::new("low", dec!(250), dec!(250), dec!(1.00))).unwrap();

        assert_eq!(full.levels, 100);
        assert_eq!(low.levels, 43);
        assert!(low.step_spread_pct > full.step_spread_pct * dec!(2));
    }

    #[test]
    fn test_dust_balances_rejected() {
        let config = GridConfig::default();
        let err = project(&config, &Scenario::new("dust", dec!(5), dec!(5), dec!(1.00))).unwrap_err();
        assert!(matches!(err, GridError::InsufficientCapital { .. }));
    }

    #[test]
    fn test_reference_set_projects() {
        let config = GridConfig::default();
        for scenario in Scenario::reference_set() {
            let projection = project(&config, &scenario).unwrap();
            assert!(projection.levels >= 1, "{}", scenario.name);
            assert!(projection.buy_levels + projection.sell_levels <= projection.levels);
        }
    }
}
