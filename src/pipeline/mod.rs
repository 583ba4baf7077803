//! Bounded, retrying, rate-limited ingestion queues: ticks feed candles.

pub mod candle_worker;
pub mod queue;
pub mod tick_worker;

pub use candle_worker::CandleJob;
pub use queue::{Job, RateLimiter, WorkQueue, WorkQueueConfig};
pub use tick_worker::TickJob;

pub const TICK_QUEUE_CONCURRENCY: usize = 5;
pub const TICK_QUEUE_MAX_JOBS_PER_SECOND: u32 = 100;
pub const CANDLE_QUEUE_CONCURRENCY: usize = 1;
pub const CANDLE_QUEUE_MAX_JOBS_PER_SECOND: u32 = 50;
pub const QUEUE_CAPACITY: usize = 1024;

pub fn start_candle_queue() -> WorkQueue {
    WorkQueue::start(WorkQueueConfig {
        name: "candle",
        capacity: QUEUE_CAPACITY,
        concurrency: CANDLE_QUEUE_CONCURRENCY,
        max_jobs_per_second: CANDLE_QUEUE_MAX_JOBS_PER_SECOND,
    })
}

pub fn start_tick_queue() -> WorkQueue {
    WorkQueue::start(WorkQueueConfig {
        name: "tick",
        capacity: QUEUE_CAPACITY,
        concurrency: TICK_QUEUE_CONCURRENCY,
        max_jobs_per_second: TICK_QUEUE_MAX_JOBS_PER_SECOND,
    })
}
