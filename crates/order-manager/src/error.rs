//! Order lifecycle errors

use rust_decimal::Decimal;
use stablegrid_core::Side;
use stablegrid_ports::ExchangeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(
        "Level {price} stuck: {side} reversing order failed after {attempts} attempts: {last_error}"
    )]
    StuckLevel {
        price: Decimal,
        side: Side,
        attempts: u32,
        last_error: ExchangeError,
    },

    #[error("Fill of {quantity} at {price} left unreversed: no {side} order to add it to")]
    Unreversed {
        price: Decimal,
        side: Side,
        quantity: Decimal,
    },

    #[error("Unknown level index: {0}")]
    UnknownLevel(usize),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

pub type Result<T> = std::result::Result<T, Error>;
