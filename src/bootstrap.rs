//! Startup (and post-reconnect warm-up) sequence: load the catalog,
//! ensure per-pair schemas exist, and hydrate the cache from durable
//! snapshots. Failures here are logged, never fatal — the session
//! engine proceeds regardless.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use crate::cache::Cache;
use crate::models::{Side, Timeframe};
use crate::store::{candles, catalog::Catalog, ticks};

const SNAPSHOT_LIMIT: i64 = 500;

pub async fn run(pool: &PgPool, cache: Arc<AsyncMutex<Cache>>) -> Catalog {
    let catalog = match Catalog::load(pool).await {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "bootstrap: failed to load currency pair catalog");
            return Catalog::default();
        }
    };

    warm_up(&catalog, pool, cache).await;
    catalog
}

/// Re-run just the schema-ensure + cache-hydrate steps against an
/// already-loaded catalog. Used for the post-reconnect warm-up, where
/// the catalog itself is refreshed in place (`Catalog::reload`) rather
/// than replaced, so clones already held by in-flight tick jobs keep
/// seeing updates.
pub async fn warm_up(catalog: &Catalog, pool: &PgPool, cache: Arc<AsyncMutex<Cache>>) {
    let eligible = catalog.eligible_pairs();
    info!(pair_count = eligible.len(), "bootstrap: warming up for eligible currency pairs");

    for pair in &eligible {
        if let Err(err) = ensure_schema(pool, &pair.symbol).await {
            error!(symbol = %pair.symbol, error = %err, "bootstrap: failed to ensure tables");
            continue;
        }
        if let Err(err) = hydrate_cache(pool, cache.clone(), &pair.symbol).await {
            error!(symbol = %pair.symbol, error = %err, "bootstrap: failed to hydrate cache");
        }
    }
}

async fn ensure_schema(pool: &PgPool, symbol: &str) -> anyhow::Result<()> {
    ticks::ensure_table(pool, symbol, Side::Bid).await?;
    ticks::ensure_table(pool, symbol, Side::Ask).await?;
    candles::ensure_table(pool, symbol).await?;
    Ok(())
}

async fn hydrate_cache(pool: &PgPool, cache: Arc<AsyncMutex<Cache>>, symbol: &str) -> anyhow::Result<()> {
    let bid_ticks = ticks::recent(pool, symbol, Side::Bid, SNAPSHOT_LIMIT).await?;
    let ask_ticks = ticks::recent(pool, symbol, Side::Ask, SNAPSHOT_LIMIT).await?;

    let mut all_candles = Vec::new();
    for timeframe in Timeframe::ALL {
        all_candles.extend(candles::recent(pool, symbol, timeframe, SNAPSHOT_LIMIT).await?);
    }

    let mut cache = cache.lock().await;
    cache.ensure_connected().await?;
    cache
        .publish_snapshot(&format!("ticks_{symbol}_bid"), &bid_ticks)
        .await?;
    cache
        .publish_snapshot(&format!("ticks_{symbol}_ask"), &ask_ticks)
        .await?;
    cache
        .publish_snapshot(&format!("candles_{symbol}"), &all_candles)
        .await?;
    Ok(())
}
