//! Market-data ingestion client library surface.
//!
//! Exposes the FIX session engine, tick/candle pipelines, durable store
//! and cache plumbing, and bootstrap/subscription logic for use by the
//! binary entrypoint and by integration tests.

pub mod bootstrap;
pub mod cache;
pub mod fix;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod subscription;

pub use models::Config;
pub use session::Session;
