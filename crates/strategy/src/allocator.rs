//! Capital allocation
//!
//! Turns balances into a uniform order size per side:
//! - sell levels share 100% of the base balance
//! - buy levels share `quote * utilization`; the rest stays in reserve
//!
//! A side whose per-level notional would fall under the exchange minimum
//! gives up its farthest levels instead of placing undersized orders.

use log::debug;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use stablegrid_core::{CapitalSnapshot, Price, Quantity};

use crate::config::GridConfig;

/// Funded levels and per-level amount for one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideAllocation {
    /// Levels this side can fund (never more than requested)
    pub levels: usize,
    /// Buy side: quote notional per level. Sell side: base quantity per level.
    pub per_level: Decimal,
}

impl SideAllocation {
    pub fn is_funded(&self) -> bool {
        self.levels > 0
    }
}

/// Result of [`CapitalAllocator::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
    pub buy: SideAllocation,
    pub sell: SideAllocation,
}

impl Allocation {
    pub fn total_levels(&self) -> usize {
        self.buy.levels + self.sell.levels
    }
}

/// Computes per-level order sizes from balances
#[derive(Debug, Clone)]
pub struct CapitalAllocator {
    utilization: Decimal,
    min_order_size: Decimal,
    size_decimals: u32,
}

impl CapitalAllocator {
    pub fn new(utilization: Decimal, min_order_size: Decimal, size_decimals: u32) -> Self {
        Self {
            utilization,
            min_order_size,
            size_decimals,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.usdc_utilization,
            config.min_order_size,
            config.size_decimals,
        )
    }

    pub fn min_order_size(&self) -> Decimal {
        self.min_order_size
    }

    /// Split balances across `buy_levels` and `sell_levels`.
    ///
    /// `reference_price` values the base balance when checking the sell
    /// side against the minimum order size.
    pub fn allocate(
        &self,
        capital: &CapitalSnapshot,
        reference_price: Price,
        buy_levels: usize,
        sell_levels: usize,
    ) -> Allocation {
        let buy_budget = capital.usable_quote(self.utilization);
        let buy = self.fund(buy_budget, buy_budget, buy_levels);

        let sell_notional = capital.base * reference_price;
        let sell = self.fund(capital.base, sell_notional, sell_levels);

        if buy.levels < buy_levels || sell.levels < sell_levels {
            debug!(
                "Capital floor reduced levels: buys {}->{}, sells {}->{}",
                buy_levels, buy.levels, sell_levels, sell.levels
            );
        }

        Allocation { buy, sell }
    }

    /// Spread `amount` over up to `requested` levels, each worth at least
    /// `min_order_size` in quote terms.
    fn fund(&self, amount: Decimal, notional: Decimal, requested: usize) -> SideAllocation {
        if requested == 0 || amount <= Decimal::ZERO {
            return SideAllocation::default();
        }

        let mut levels = requested;
        if notional / Decimal::from(levels) < self.min_order_size {
            levels = (notional / self.min_order_size)
                .floor()
                .to_usize()
                .unwrap_or(0)
                .min(requested);
        }
        if levels == 0 {
            return SideAllocation::default();
        }

        // Truncate so `per_level * levels` never exceeds `amount`
        let per_level = (amount / Decimal::from(levels))
            .round_dp_with_strategy(12, RoundingStrategy::ToZero);
        SideAllocation { levels, per_level }
    }

    /// Base quantity for a buy level funded with `notional` quote, rounded down
    pub fn buy_quantity(&self, notional: Decimal, price: Price) -> Quantity {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.round_down(notional / price)
    }

    /// Base quantity for a sell level, rounded down
    pub fn sell_quantity(&self, per_level: Quantity) -> Quantity {
        self.round_down(per_level)
    }

    fn round_down(&self, quantity: Quantity) -> Quantity {
        quantity.round_dp_with_strategy(self.size_decimals, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn allocator() -> CapitalAllocator {
        CapitalAllocator::new(dec!(0.90), dec!(11), 2)
    }

    #[test]
    fn test_uniform_split_uses_full_base_and_reserved_quote() {
        let capital = CapitalSnapshot::new(dec!(500), dec!(1000));
        let allocation = allocator().allocate(&capital, dec!(1.00), 10, 20);

        assert_eq!(allocation.buy.levels, 10);
        assert_eq!(allocation.buy.per_level, dec!(90));
        assert_eq!(allocation.sell.levels, 20);
        assert_eq!(allocation.sell.per_level, dec!(25));

        // Equality when counts divide the budgets evenly
        assert_eq!(allocation.buy.per_level * dec!(10), dec!(900));
        assert_eq!(allocation.sell.per_level * dec!(20), dec!(500));
    }

    #[test]
    fn test_floor_reduces_level_count() {
        // 99 usable quote over 20 levels is 4.95 each; only 9 levels reach $11
        let capital = CapitalSnapshot::new(dec!(0), dec!(110));
        let allocation = allocator().allocate(&capital, dec!(1.00), 20, 5);

        assert_eq!(allocation.buy.levels, 9);
        assert_eq!(allocation.buy.per_level, dec!(11));
        assert!(!allocation.sell.is_funded());
    }

    #[test]
    fn test_side_below_minimum_unfunded() {
        let capital = CapitalSnapshot::new(dec!(10), dec!(5));
        let allocation = allocator().allocate(&capital, dec!(1.00), 3, 3);
        assert_eq!(allocation.total_levels(), 0);
    }

    #[test]
    fn test_quantities_round_down() {
        let allocator = allocator();
        assert_eq!(allocator.buy_quantity(dec!(11), dec!(0.99)), dec!(11.11));
        assert_eq!(allocator.sell_quantity(dec!(33.339)), dec!(33.33));
    }

    proptest! {
        #[test]
        fn prop_allocation_never_exceeds_budget(
            base in 0u32..100_000,
            quote in 0u32..100_000,
            buys in 0usize..100,
            sells in 0usize..100,
        ) {
            let capital = CapitalSnapshot::new(Decimal::from(base), Decimal::from(quote));
            let allocator = allocator();
            let allocation = allocator.allocate(&capital, dec!(1.00), buys, sells);

            prop_assert!(allocation.buy.levels <= buys);
            prop_assert!(allocation.sell.levels <= sells);

            let buy_total = allocation.buy.per_level * Decimal::from(allocation.buy.levels);
            prop_assert!(buy_total <= capital.usable_quote(dec!(0.90)));
            let sell_total = allocator.sell_quantity(allocation.sell.per_level)
                * Decimal::from(allocation.sell.levels);
            prop_assert!(sell_total <= capital.base);

            if allocation.buy.is_funded() {
                prop_assert!(allocation.buy.per_level >= dec!(11));
            }
        }
    }
}
