//! Generic bounded, rate-limited, retrying work queue. Both the tick
//! and candle pipelines are one of these with different concurrency,
//! rate-limit and job-type parameters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{error, warn};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn execute(&self) -> anyhow::Result<()>;

    /// For logging only.
    fn describe(&self) -> String;
}

/// Global token-bucket rate limiter: at most `max_per_second` acquisitions
/// per rolling one-second window.
pub struct RateLimiter {
    max_per_second: u32,
    state: Mutex<RateLimiterState>,
}

struct RateLimiterState {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            state: Mutex::new(RateLimiterState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                if now.duration_since(state.window_start) >= Duration::from_secs(1) {
                    state.window_start = now;
                    state.count = 0;
                }
                if state.count < self.max_per_second {
                    state.count += 1;
                    None
                } else {
                    Some(Duration::from_secs(1).saturating_sub(now.duration_since(state.window_start)))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

/// A bounded queue with a fixed worker pool. Jobs that exhaust their
/// retries are dropped with an error log; successful jobs are not
/// retained (no replay log).
pub struct WorkQueue {
    sender: mpsc::Sender<Box<dyn Job>>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

pub struct WorkQueueConfig {
    pub name: &'static str,
    pub capacity: usize,
    pub concurrency: usize,
    pub max_jobs_per_second: u32,
}

impl WorkQueue {
    pub fn start(config: WorkQueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel::<Box<dyn Job>>(config.capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let rate_limiter = Arc::new(RateLimiter::new(config.max_jobs_per_second));
        let concurrency_gate = Arc::new(Semaphore::new(config.concurrency));
        let mut workers = Vec::with_capacity(config.concurrency);

        for worker_id in 0..config.concurrency {
            let receiver = receiver.clone();
            let rate_limiter = rate_limiter.clone();
            let concurrency_gate = concurrency_gate.clone();
            let name = config.name;
            let handle = tokio::spawn(async move {
                loop {
                    let job = {
                        let mut receiver = receiver.lock().await;
                        receiver.recv().await
                    };
                    let Some(job) = job else {
                        break; // queue closed
                    };

                    let permit = concurrency_gate
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("semaphore never closed while workers run");
                    rate_limiter.acquire().await;
                    run_with_retry(name, worker_id, job.as_ref()).await;
                    drop(permit);
                }
            });
            workers.push(handle);
        }

        Self { sender, workers }
    }

    pub async fn enqueue(&self, job: Box<dyn Job>) -> Result<(), anyhow::Error> {
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("queue is closed"))
    }

    /// Stop accepting new work, then wait for every worker to drain its
    /// in-flight and already-buffered jobs before returning. Consumes
    /// the queue: dropping the sender lets workers exit once the
    /// channel empties.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "queue worker task panicked during shutdown");
            }
        }
    }
}

async fn run_with_retry(queue_name: &str, worker_id: usize, job: &dyn Job) {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_ATTEMPTS {
        match tokio::time::timeout(JOB_TIMEOUT, job.execute()).await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                warn!(queue = queue_name, worker_id, attempt, job = %job.describe(), error = %err, "job failed");
            }
            Err(_) => {
                warn!(queue = queue_name, worker_id, attempt, job = %job.describe(), "job stalled past timeout");
            }
        }
        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
    error!(queue = queue_name, job = %job.describe(), "job exhausted retries, dropping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        attempts: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn execute(&self) -> anyhow::Result<()> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(anyhow::anyhow!("simulated transient failure"));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "counting-job".to_string()
        }
    }

    #[tokio::test]
    async fn job_retries_until_success_within_attempt_budget() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let job = CountingJob { attempts: attempts.clone(), fail_first: 2 };
        run_with_retry("test", 0, &job).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn job_exhausts_retries_and_is_dropped() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let job = CountingJob { attempts: attempts.clone(), fail_first: usize::MAX };
        run_with_retry("test", 0, &job).await;
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn rate_limiter_caps_throughput_per_window() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await; // third acquisition must wait for the next window
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn enqueue_and_shutdown_drains_in_flight_jobs() {
        let queue = WorkQueue::start(WorkQueueConfig {
            name: "test",
            capacity: 8,
            concurrency: 2,
            max_jobs_per_second: 100,
        });

        let attempts = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let job = CountingJob { attempts: attempts.clone(), fail_first: 0 };
            queue.enqueue(Box::new(job)).await.unwrap();
        }

        queue.shutdown().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
