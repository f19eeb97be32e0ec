//! Grid configuration
//!
//! Defaults mirror the production FEUSD/USDC setup: a 0.98 - 1.20 range
//! (protocol liquidation and buyback limits), up to 100 levels, $11 minimum
//! orders and 10% of USDC held back as reserve.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use stablegrid_core::GridShape;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GridError, Result};

/// Prefix of the environment variables read by [`GridConfig::from_env`]
pub const ENV_PREFIX: &str = "GRID_";

/// Configuration for the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Lowest grid price
    pub lower_bound: Decimal,
    /// Highest grid price
    pub upper_bound: Decimal,
    /// Maximum number of levels
    pub max_levels: usize,
    /// Share of the quote balance committed to buy orders (rest is reserve)
    pub usdc_utilization: Decimal,
    /// Minimum order notional in quote
    pub min_order_size: Decimal,
    /// Seconds between refresh cycles
    pub refresh_secs: u64,
    /// Realized profit that triggers an order resize
    pub compound_threshold: Decimal,
    /// Decimal places for level prices
    pub price_decimals: u32,
    /// Decimal places for order quantities
    pub size_decimals: u32,
    /// Fees paid on a full round trip, as a fraction of notional
    pub round_trip_fee_rate: Decimal,
    /// Where the session snapshot is kept between restarts
    pub state_path: Option<PathBuf>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            lower_bound: dec!(0.98),
            upper_bound: dec!(1.20),
            max_levels: 100,
            usdc_utilization: dec!(0.90),
            min_order_size: dec!(11),
            refresh_secs: 300,
            compound_threshold: dec!(1.0),
            price_decimals: 4,
            size_decimals: 2,
            round_trip_fee_rate: dec!(0.0008),
            state_path: None,
        }
    }
}

impl GridConfig {
    /// Load from `GRID_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (keys include [`ENV_PREFIX`])
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            lower_bound: read(&lookup, "LOWER_BOUND", defaults.lower_bound)?,
            upper_bound: read(&lookup, "UPPER_BOUND", defaults.upper_bound)?,
            max_levels: read(&lookup, "MAX_LEVELS", defaults.max_levels)?,
            usdc_utilization: read(&lookup, "USDC_UTILIZATION", defaults.usdc_utilization)?,
            min_order_size: read(&lookup, "MIN_ORDER_SIZE", defaults.min_order_size)?,
            refresh_secs: read(&lookup, "REFRESH_SECONDS", defaults.refresh_secs)?,
            compound_threshold: read(&lookup, "COMPOUND_THRESHOLD", defaults.compound_threshold)?,
            price_decimals: read(&lookup, "PRICE_DECIMALS", defaults.price_decimals)?,
            size_decimals: read(&lookup, "SIZE_DECIMALS", defaults.size_decimals)?,
            round_trip_fee_rate: read(&lookup, "ROUND_TRIP_FEE_RATE", defaults.round_trip_fee_rate)?,
            state_path: lookup(&format!("{ENV_PREFIX}STATE_PATH")).map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints grid construction relies on
    pub fn validate(&self) -> Result<()> {
        if self.lower_bound <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(format!(
                "lower_bound must be positive, got {}",
                self.lower_bound
            )));
        }
        if self.lower_bound >= self.upper_bound {
            return Err(GridError::InvalidConfig(format!(
                "lower_bound {} must be below upper_bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        if self.max_levels == 0 {
            return Err(GridError::InvalidConfig(
                "max_levels must be at least 1".to_string(),
            ));
        }
        if self.usdc_utilization <= Decimal::ZERO || self.usdc_utilization > Decimal::ONE {
            return Err(GridError::InvalidConfig(format!(
                "usdc_utilization must be in (0, 1], got {}",
                self.usdc_utilization
            )));
        }
        if self.min_order_size <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(format!(
                "min_order_size must be positive, got {}",
                self.min_order_size
            )));
        }
        if self.refresh_secs == 0 {
            return Err(GridError::InvalidConfig(
                "refresh_secs must be at least 1".to_string(),
            ));
        }
        if self.compound_threshold <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(format!(
                "compound_threshold must be positive, got {}",
                self.compound_threshold
            )));
        }
        if self.round_trip_fee_rate < Decimal::ZERO {
            return Err(GridError::InvalidConfig(format!(
                "round_trip_fee_rate must not be negative, got {}",
                self.round_trip_fee_rate
            )));
        }
        Ok(())
    }

    /// Bounds and level cap; a change here forces a grid rebuild
    pub fn shape(&self) -> GridShape {
        GridShape {
            lower_bound: self.lower_bound,
            upper_bound: self.upper_bound,
            max_levels: self.max_levels,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

fn read<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GridError::InvalidConfig(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = GridConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = GridConfig::from_lookup(lookup_from(&[
            ("GRID_MAX_LEVELS", "50"),
            ("GRID_UPPER_BOUND", "1.10"),
            ("GRID_STATE_PATH", "/tmp/grid.json"),
        ]))
        .unwrap();

        assert_eq!(config.max_levels, 50);
        assert_eq!(config.upper_bound, dec!(1.10));
        assert_eq!(config.lower_bound, dec!(0.98));
        assert_eq!(config.state_path, Some(PathBuf::from("/tmp/grid.json")));
    }

    #[test]
    fn test_unparsable_value_rejected() {
        let err = GridConfig::from_lookup(lookup_from(&[("GRID_MAX_LEVELS", "lots")])).unwrap_err();
        assert!(matches!(err, GridError::InvalidConfig(msg) if msg.contains("GRID_MAX_LEVELS")));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = GridConfig {
            lower_bound: dec!(1.2),
            upper_bound: dec!(0.98),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_utilization_must_be_fraction() {
        let config = GridConfig {
            usdc_utilization: dec!(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: GridConfig =
            serde_json::from_str(r#"{"max_levels": 20, "refresh_secs": 60}"#).unwrap();
        assert_eq!(config.max_levels, 20);
        assert_eq!(config.refresh_secs, 60);
        assert_eq!(config.min_order_size, dec!(11));
    }
}
