//! Tick job: normalize one raw quote, mirror it into the cache, persist
//! it, and — for BID ticks only — hand the resulting tick to the candle
//! queue.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::Cache;
use crate::models::{RawQuote, Side};
use crate::normalize::normalize;
use crate::pipeline::candle_worker::CandleJob;
use crate::pipeline::queue::{Job, WorkQueue};
use crate::store::catalog::Catalog;
use crate::store::ticks;

pub struct TickJob {
    pub job_id: String,
    pub quote: RawQuote,
    pub catalog: Catalog,
    pub pool: PgPool,
    pub cache: Arc<AsyncMutex<Cache>>,
    pub candle_queue: Arc<WorkQueue>,
}

impl TickJob {
    pub fn new(
        quote: RawQuote,
        catalog: Catalog,
        pool: PgPool,
        cache: Arc<AsyncMutex<Cache>>,
        candle_queue: Arc<WorkQueue>,
        now_ms: i64,
    ) -> Self {
        let job_id = format!("{}_{}_{}", quote.symbol, quote.side.as_str(), now_ms);
        Self {
            job_id,
            quote,
            catalog,
            pool,
            cache,
            candle_queue,
        }
    }
}

#[async_trait]
impl Job for TickJob {
    async fn execute(&self) -> anyhow::Result<()> {
        let mut contract_size = self.catalog.contract_size(&self.quote.symbol);
        if contract_size.is_none() {
            contract_size = self
                .catalog
                .refresh_from_store(&self.pool, &self.quote.symbol)
                .await?;
        }

        let tick = normalize(&self.quote, contract_size)?;

        // Cache append happens before the durable insert: the cache may
        // briefly hold a tick the durable store later rejects on conflict.
        {
            let mut cache = self.cache.lock().await;
            cache.append_tick(&tick).await?;
        }
        ticks::insert(&self.pool, &tick).await?;

        if tick.side == Side::Bid {
            let candle_job = CandleJob {
                tick,
                pool: self.pool.clone(),
                cache: self.cache.clone(),
            };
            self.candle_queue.enqueue(Box::new(candle_job)).await?;
        }

        Ok(())
    }

    fn describe(&self) -> String {
        self.job_id.clone()
    }
}
