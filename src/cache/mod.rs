//! Hot-cache mirror backed by Redis. Reconnection is idempotent: a
//! reconnect attempt is a no-op if the connection manager is already
//! live, so calling it once per session reconnect attempt (in parallel
//! with the socket rebuild) never errors on an already-open connection.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::{Candle, Tick};

pub struct Cache {
    url: String,
    conn: Option<ConnectionManager>,
}

impl Cache {
    pub fn new(url: String) -> Self {
        Self { url, conn: None }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Connect only if not already connected.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let client = redis::Client::open(self.url.as_str()).context("building redis client")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("connecting to redis")?;
        self.conn = Some(manager);
        Ok(())
    }

    fn connection(&mut self) -> Result<&mut ConnectionManager> {
        self.conn
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("cache is not connected"))
    }

    /// Append a tick onto the ordered list `ticks_{symbol}_{side}`.
    /// Symbol is lowercased so this stays the same key the durable-store
    /// `table_name()` helpers and the bootstrap snapshot use, regardless
    /// of the case a venue echoes back on `55=`.
    pub async fn append_tick(&mut self, tick: &Tick) -> Result<()> {
        let key = format!("ticks_{}_{}", tick.symbol.to_lowercase(), tick.side.as_str());
        let payload = serde_json::to_string(tick).context("serializing tick for cache")?;
        self.connection()?
            .rpush::<_, _, ()>(key, payload)
            .await
            .context("appending tick to cache list")?;
        Ok(())
    }

    fn candle_key(symbol: &str, timeframe: &str, candletime_iso: &str) -> String {
        format!("candle_{}_{timeframe}_{candletime_iso}", symbol.to_lowercase())
    }

    pub async fn get_candle(
        &mut self,
        symbol: &str,
        timeframe: &str,
        candletime_iso: &str,
    ) -> Result<Option<Candle>> {
        let key = Self::candle_key(symbol, timeframe, candletime_iso);
        let raw: Option<String> = self
            .connection()?
            .get(key)
            .await
            .context("reading candle from cache")?;
        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("deserializing cached candle")?,
            )),
            None => Ok(None),
        }
    }

    pub async fn set_candle(
        &mut self,
        symbol: &str,
        timeframe: &str,
        candletime_iso: &str,
        candle: &Candle,
    ) -> Result<()> {
        let key = Self::candle_key(symbol, timeframe, candletime_iso);
        let payload = serde_json::to_string(candle).context("serializing candle for cache")?;
        self.connection()?
            .set::<_, _, ()>(key, payload)
            .await
            .context("writing candle to cache")?;
        Ok(())
    }

    /// Publish a bootstrap snapshot. Overwrites whatever was at the key.
    pub async fn publish_snapshot<T: serde::Serialize>(&mut self, key: &str, items: &[T]) -> Result<()> {
        let serialized: Vec<String> = items
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<_, _>>()
            .context("serializing snapshot items")?;

        let conn = self.connection()?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(conn)
            .await
            .context("clearing snapshot key before publish")?;
        if !serialized.is_empty() {
            conn.rpush::<_, _, ()>(key, serialized)
                .await
                .context("publishing snapshot")?;
        }
        Ok(())
    }

    pub async fn close(&mut self) {
        self.conn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_key_matches_spec_format() {
        let key = Cache::candle_key("eurusd", "M1", "2026-01-01T12:00:00Z");
        assert_eq!(key, "candle_eurusd_M1_2026-01-01T12:00:00Z");
    }

    #[test]
    fn candle_key_lowercases_symbol_to_match_store_table_names() {
        let key = Cache::candle_key("EURUSD", "M1", "2026-01-01T12:00:00Z");
        assert_eq!(key, "candle_eurusd_M1_2026-01-01T12:00:00Z");
    }

    #[test]
    fn fresh_cache_is_disconnected() {
        let cache = Cache::new("redis://localhost:6379".to_string());
        assert!(!cache.is_connected());
    }
}
