//! Durable storage: connection pool, currency-pair catalog, and the
//! dynamic per-symbol tick/candle tables.

pub mod candles;
pub mod catalog;
pub mod pool;
pub mod ticks;

pub use catalog::Catalog;
pub use pool::create_pool;
