use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{GridLevel, LevelState, Side};
use crate::values::{OrderRef, Price, Timestamp};

/// Parameters a grid was built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridShape {
    pub lower_bound: Price,
    pub upper_bound: Price,
    pub max_levels: usize,
}

/// Ordered ladder of grid levels, unique by price, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    levels: Vec<GridLevel>,
    shape: GridShape,
    /// Constant ratio between consecutive level prices
    ratio: Decimal,
    /// Price the buy/sell split was taken against
    reference_price: Price,
    built_at: Timestamp,
}

impl Grid {
    /// Assemble a grid. Levels are sorted and deduplicated by price.
    ///
    /// Returns `None` when no level is left.
    pub fn new(
        mut levels: Vec<GridLevel>,
        shape: GridShape,
        ratio: Decimal,
        reference_price: Price,
    ) -> Option<Self> {
        levels.sort_by(|a, b| a.price().cmp(&b.price()));
        levels.dedup_by(|a, b| a.price() == b.price());
        if levels.is_empty() {
            return None;
        }
        Some(Self {
            levels,
            shape,
            ratio,
            reference_price,
            built_at: Utc::now(),
        })
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> impl Iterator<Item = &mut GridLevel> {
        self.levels.iter_mut()
    }

    pub fn level(&self, index: usize) -> Option<&GridLevel> {
        self.levels.get(index)
    }

    pub fn level_mut(&mut self, index: usize) -> Option<&mut GridLevel> {
        self.levels.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn ratio(&self) -> Decimal {
        self.ratio
    }

    pub fn reference_price(&self) -> Price {
        self.reference_price
    }

    pub fn built_at(&self) -> Timestamp {
        self.built_at
    }

    /// Index of the level whose resting order is `order_ref`
    pub fn index_of_ref(&self, order_ref: OrderRef) -> Option<usize> {
        self.levels
            .iter()
            .position(|l| l.order_ref() == Some(order_ref))
    }

    /// Index of the level at exactly `price`
    pub fn index_of_price(&self, price: Price) -> Option<usize> {
        self.levels
            .binary_search_by(|l| l.price().cmp(&price))
            .ok()
    }

    /// Number of levels currently in `state`
    pub fn count_in(&self, state: LevelState) -> usize {
        self.levels.iter().filter(|l| l.state() == state).count()
    }

    /// Number of levels whose order rests on `side`
    pub fn count_resting_on(&self, side: Side) -> usize {
        self.levels
            .iter()
            .filter(|l| l.state().is_resting() && l.resting_side() == side)
            .count()
    }

    /// Order refs the exchange is expected to hold
    pub fn resting_refs(&self) -> Vec<OrderRef> {
        self.levels.iter().filter_map(|l| l.order_ref()).collect()
    }

    /// Indices of levels in `state`, ascending by price
    pub fn indices_in(&self, state: LevelState) -> Vec<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.state() == state)
            .map(|(i, _)| i)
            .collect()
    }

    /// True when `price` lies within the grid bounds
    pub fn in_bounds(&self, price: Price) -> bool {
        price >= self.shape.lower_bound && price <= self.shape.upper_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shape() -> GridShape {
        GridShape {
            lower_bound: dec!(0.98),
            upper_bound: dec!(1.20),
            max_levels: 10,
        }
    }

    #[test]
    fn test_levels_sorted_and_unique() {
        let levels = vec![
            GridLevel::new(dec!(1.05), Side::Sell, dec!(10)),
            GridLevel::new(dec!(0.99), Side::Buy, dec!(10)),
            GridLevel::new(dec!(1.05), Side::Sell, dec!(12)),
        ];
        let grid = Grid::new(levels, shape(), dec!(1.02), dec!(1.00)).unwrap();

        assert_eq!(grid.len(), 2);
        assert_eq!(grid.levels()[0].price(), dec!(0.99));
        assert_eq!(grid.levels()[1].price(), dec!(1.05));
        assert_eq!(grid.index_of_price(dec!(1.05)), Some(1));
        assert_eq!(grid.index_of_price(dec!(1.00)), None);
    }

    #[test]
    fn test_empty_grid_rejected() {
        assert!(Grid::new(Vec::new(), shape(), dec!(1.02), dec!(1.00)).is_none());
    }

    #[test]
    fn test_lookup_by_order_ref() {
        let mut grid = Grid::new(
            vec![
                GridLevel::new(dec!(0.99), Side::Buy, dec!(10)),
                GridLevel::new(dec!(1.01), Side::Sell, dec!(10)),
            ],
            shape(),
            dec!(1.02),
            dec!(1.00),
        )
        .unwrap();
        grid.level_mut(1).unwrap().mark_open(OrderRef(42));

        assert_eq!(grid.index_of_ref(OrderRef(42)), Some(1));
        assert_eq!(grid.resting_refs(), vec![OrderRef(42)]);
        assert_eq!(grid.count_in(LevelState::Pending), 1);
        assert_eq!(grid.count_resting_on(Side::Sell), 1);
        assert!(grid.in_bounds(dec!(1.20)));
        assert!(!grid.in_bounds(dec!(1.21)));
    }
}
