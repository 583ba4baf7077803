//! Candle job: one (symbol, BID tick) fans out into one cache-then-durable
//! update per active timeframe. Concurrency is pinned to 1 by the queue
//! that runs these, which is what makes the read-modify-write safe
//! without a per-bucket lock.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::cache::Cache;
use crate::models::{Candle, Tick, Timeframe};
use crate::pipeline::queue::Job;
use crate::store::candles;

pub struct CandleJob {
    pub tick: Tick,
    pub pool: PgPool,
    pub cache: Arc<AsyncMutex<Cache>>,
}

#[async_trait]
impl Job for CandleJob {
    async fn execute(&self) -> anyhow::Result<()> {
        for timeframe in Timeframe::ALL {
            self.apply_timeframe(timeframe).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("candle:{}:{}", self.tick.symbol, self.tick.ticktime)
    }
}

impl CandleJob {
    async fn apply_timeframe(&self, timeframe: Timeframe) -> anyhow::Result<()> {
        let candletime = timeframe.candletime_for(self.tick.ticktime);
        let candletime_iso = candletime.to_rfc3339();

        let candle = {
            let mut cache = self.cache.lock().await;
            let existing = cache
                .get_candle(&self.tick.symbol, timeframe.as_str(), &candletime_iso)
                .await?;

            let candle = match existing {
                Some(mut candle) => {
                    candle.apply_tick(self.tick.price);
                    candle
                }
                None => Candle::opening(
                    self.tick.symbol.clone(),
                    timeframe,
                    candletime,
                    self.tick.price,
                ),
            };

            cache
                .set_candle(&self.tick.symbol, timeframe.as_str(), &candletime_iso, &candle)
                .await?;
            candle
        };

        debug!(symbol = %self.tick.symbol, timeframe = timeframe.as_str(), %candletime_iso, "candle updated in cache");
        candles::upsert(&self.pool, &candle).await?;
        Ok(())
    }
}
