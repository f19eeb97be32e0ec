//! Grid construction errors

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid bounds: lower={lower}, upper={upper}, price={price}")]
    InvalidBounds {
        lower: Decimal,
        upper: Decimal,
        price: Decimal,
    },

    #[error("Insufficient capital: available={available}, required={required}")]
    InsufficientCapital { available: Decimal, required: Decimal },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
