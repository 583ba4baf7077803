//! Per-symbol BID candle tables. Only BID ticks ever reach the candle
//! engine, so there is exactly one candle table per symbol.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use crate::models::{Candle, Timeframe};

fn table_name(symbol: &str) -> String {
    format!("candles_{}_bid", symbol.to_lowercase())
}

pub async fn ensure_table(pool: &PgPool, symbol: &str) -> Result<()> {
    let table = table_name(symbol);
    let ddl = format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
            candlesize text NOT NULL,
            lots smallint NOT NULL,
            candletime timestamptz NOT NULL,
            open double precision NOT NULL,
            high double precision NOT NULL,
            low double precision NOT NULL,
            close double precision NOT NULL,
            PRIMARY KEY (candlesize, lots, candletime)
        )"#
    );
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .with_context(|| format!("ensuring {table} exists"))?;
    Ok(())
}

/// Idempotent under retry: `GREATEST`/`LEAST` rather than an
/// unconditional overwrite, so re-applying the same tick after a
/// timed-out job leaves the candle unchanged.
pub async fn upsert(pool: &PgPool, candle: &Candle) -> Result<()> {
    let table = table_name(&candle.symbol);
    let sql = format!(
        r#"INSERT INTO {table} (candlesize, lots, candletime, open, high, low, close)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (candlesize, lots, candletime) DO UPDATE SET
               high = GREATEST({table}.high, EXCLUDED.high),
               low = LEAST({table}.low, EXCLUDED.low),
               close = EXCLUDED.close"#
    );
    sqlx::query(&sql)
        .bind(candle.timeframe.as_str())
        .bind(candle.lots)
        .bind(candle.candletime)
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .execute(pool)
        .await
        .with_context(|| format!("upserting candle into {table}"))?;
    Ok(())
}

pub async fn recent(pool: &PgPool, symbol: &str, timeframe: Timeframe, limit: i64) -> Result<Vec<Candle>> {
    let table = table_name(symbol);
    let sql = format!(
        "SELECT candletime, open, high, low, close FROM {table} WHERE candlesize = $1 ORDER BY candletime DESC LIMIT $2"
    );
    let rows = sqlx::query(&sql)
        .bind(timeframe.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("reading recent candles from {table}"))?;

    Ok(rows
        .into_iter()
        .map(|row| Candle {
            symbol: symbol.to_string(),
            timeframe,
            lots: 1,
            candletime: row.get("candletime"),
            open: row.get("open"),
            high: row.get("high"),
            low: row.get("low"),
            close: row.get("close"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_is_per_symbol_bid_only() {
        assert_eq!(table_name("EURUSD"), "candles_eurusd_bid");
    }
}
