//! Price Feed - random-walk mid price for paper trading
//!
//! Stablecoin pairs mean-revert around the peg, so the walk is pulled back
//! toward `anchor` on every step and clamped to `[floor, ceiling]`.

use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stablegrid_core::Price;

/// Configuration for the random walk
#[derive(Debug, Clone)]
pub struct PriceWalkConfig {
    pub start: Price,
    /// Price the walk reverts toward
    pub anchor: Price,
    /// Largest relative move per step (0.001 = 0.1%)
    pub volatility: f64,
    /// Share of the distance to `anchor` closed each step
    pub reversion: f64,
    pub floor: Price,
    pub ceiling: Price,
    /// Decimal places of emitted prices
    pub decimals: u32,
}

impl Default for PriceWalkConfig {
    fn default() -> Self {
        Self {
            start: dec!(1.0000),
            anchor: dec!(1.0000),
            volatility: 0.002,
            reversion: 0.02,
            floor: dec!(0.9500),
            ceiling: dec!(1.2500),
            decimals: 4,
        }
    }
}

/// Generates successive mid prices
pub struct PriceWalk {
    price: Price,
    config: PriceWalkConfig,
    rng: rand::rngs::StdRng,
}

impl PriceWalk {
    pub fn new(config: PriceWalkConfig) -> Self {
        Self {
            price: config.start,
            config,
            rng: rand::SeedableRng::from_entropy(),
        }
    }

    /// Create with a specific seed for reproducible sessions
    pub fn with_seed(config: PriceWalkConfig, seed: u64) -> Self {
        Self {
            price: config.start,
            config,
            rng: rand::SeedableRng::seed_from_u64(seed),
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Advance one step and return the new price
    pub fn next_price(&mut self) -> Price {
        let current = self.price.to_f64().unwrap_or(1.0);
        let anchor = self.config.anchor.to_f64().unwrap_or(1.0);
        let shock: f64 = self.rng.gen_range(-1.0..1.0);

        let next = current + (anchor - current) * self.config.reversion
            + current * self.config.volatility * shock;
        let next = Decimal::from_f64(next)
            .unwrap_or(self.price)
            .round_dp(self.config.decimals)
            .clamp(self.config.floor, self.config.ceiling);

        self.price = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_stays_within_clamp() {
        let mut walk = PriceWalk::with_seed(PriceWalkConfig::default(), 42);
        for _ in 0..10_000 {
            let price = walk.next_price();
            assert!(price >= dec!(0.9500) && price <= dec!(1.2500));
            assert!(price.scale() <= 4);
        }
    }

    #[test]
    fn test_same_seed_same_path() {
        let mut a = PriceWalk::with_seed(PriceWalkConfig::default(), 7);
        let mut b = PriceWalk::with_seed(PriceWalkConfig::default(), 7);
        for _ in 0..100 {
            assert_eq!(a.next_price(), b.next_price());
        }
    }

    #[test]
    fn test_walk_reverts_toward_anchor() {
        let config = PriceWalkConfig {
            start: dec!(1.2000),
            volatility: 0.0,
            ..Default::default()
        };
        let mut walk = PriceWalk::with_seed(config, 1);
        let mut last = walk.price();
        for _ in 0..50 {
            let price = walk.next_price();
            assert!(price <= last);
            last = price;
        }
        assert!(last < dec!(1.1000));
    }
}
