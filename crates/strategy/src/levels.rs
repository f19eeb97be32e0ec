//! Price ladder generation
//!
//! Levels are spaced geometrically between the bounds so every step captures
//! the same relative spread: `price[i] = lower * ratio^i` with
//! `ratio = (upper / lower)^(1 / (n - 1))`.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use stablegrid_core::{Price, Side};

use crate::error::{GridError, Result};

/// A generated price point and the side it takes at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Price,
    pub side: Side,
}

/// Output of [`generate_levels`]
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    /// Levels ascending by price; the level on the current price is excluded
    pub levels: Vec<PriceLevel>,
    /// Ratio between consecutive prices
    pub ratio: Decimal,
}

impl LevelPlan {
    pub fn buys(&self) -> impl DoubleEndedIterator<Item = &PriceLevel> {
        self.levels.iter().filter(|l| l.side == Side::Buy)
    }

    pub fn sells(&self) -> impl DoubleEndedIterator<Item = &PriceLevel> {
        self.levels.iter().filter(|l| l.side == Side::Sell)
    }

    /// Relative spread captured by one grid step
    pub fn step_spread(&self) -> Decimal {
        self.ratio - Decimal::ONE
    }
}

/// Number of levels the capital can fund: `min(max_levels, floor(capital / min_order_size))`
pub fn level_count(capital: Decimal, min_order_size: Decimal, max_levels: usize) -> Result<usize> {
    if min_order_size <= Decimal::ZERO {
        return Err(GridError::InvalidConfig(format!(
            "min_order_size must be positive, got {min_order_size}"
        )));
    }
    let fundable = (capital / min_order_size).floor();
    if fundable < Decimal::ONE {
        return Err(GridError::InsufficientCapital {
            available: capital,
            required: min_order_size,
        });
    }
    let fundable = fundable.to_usize().unwrap_or(usize::MAX);
    Ok(fundable.min(max_levels).max(1))
}

/// Check `0 < lower < current < upper`
pub fn validate_bounds(lower: Price, upper: Price, current: Price) -> Result<()> {
    if lower <= Decimal::ZERO || lower >= upper || current <= lower || current >= upper {
        return Err(GridError::InvalidBounds {
            lower,
            upper,
            price: current,
        });
    }
    Ok(())
}

/// Generate `count` geometrically spaced levels and tag them against `current`.
///
/// The bounds are part of the ladder. Prices are rounded to `price_decimals`
/// and duplicates created by rounding are collapsed. A one-level ladder sits
/// on `lower`.
pub fn generate_levels(
    lower: Price,
    upper: Price,
    count: usize,
    current: Price,
    price_decimals: u32,
) -> Result<LevelPlan> {
    validate_bounds(lower, upper, current)?;
    if count == 0 {
        return Err(GridError::InvalidConfig(
            "level count must be at least 1".to_string(),
        ));
    }

    let ratio = step_ratio(lower, upper, count)?;
    let mut prices = Vec::with_capacity(count);
    if count == 1 {
        prices.push(lower.round_dp(price_decimals));
    } else {
        let lower_f = to_f64(lower)?;
        let ratio_f = to_f64(ratio)?;
        for i in 0..count - 1 {
            let raw = lower_f * ratio_f.powi(i as i32);
            prices.push(from_f64(raw)?.round_dp(price_decimals));
        }
        // Pin the top level so float drift never leaves the bounds
        prices.push(upper.round_dp(price_decimals));
    }
    prices.dedup();

    let levels = prices
        .into_iter()
        .filter(|p| *p >= lower && *p <= upper)
        .filter_map(|price| Side::for_level(price, current).map(|side| PriceLevel { price, side }))
        .collect();

    Ok(LevelPlan { levels, ratio })
}

/// `(upper / lower)^(1 / (count - 1))`, or the full range for a single level
fn step_ratio(lower: Price, upper: Price, count: usize) -> Result<Decimal> {
    let span = to_f64(upper)? / to_f64(lower)?;
    let ratio = if count > 1 {
        span.powf(1.0 / (count - 1) as f64)
    } else {
        span
    };
    Ok(from_f64(ratio)?.round_dp(12))
}

fn to_f64(value: Decimal) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| GridError::InvalidConfig(format!("{value} is not representable")))
}

fn from_f64(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| GridError::InvalidConfig(format!("{value} is not a finite price")))
}
