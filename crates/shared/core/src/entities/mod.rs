mod capital;
mod compounding;
mod fill;
mod grid;
mod grid_level;
mod level_state;
mod order_kind;
mod side;

pub use capital::CapitalSnapshot;
pub use compounding::CompoundingState;
pub use fill::Fill;
pub use grid::{Grid, GridShape};
pub use grid_level::GridLevel;
pub use level_state::LevelState;
pub use order_kind::OrderKind;
pub use side::Side;
