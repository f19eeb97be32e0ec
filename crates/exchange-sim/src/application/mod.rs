mod exchange;

pub use exchange::SimExchange;
