//! Per-`(symbol, side)` tick tables. Table names are dynamic, so these
//! queries are built with `format!` rather than `sqlx::query!` macros —
//! the symbol is always lowercased and drawn from the boot-time catalog,
//! never from unescaped user input.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use crate::models::{Side, Tick};

fn table_name(symbol: &str, side: Side) -> String {
    format!("ticks_{}_{}", symbol.to_lowercase(), side.as_str())
}

pub async fn ensure_table(pool: &PgPool, symbol: &str, side: Side) -> Result<()> {
    let table = table_name(symbol, side);
    let ddl = format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
            ticktime timestamptz NOT NULL,
            lots integer PRIMARY KEY,
            price double precision NOT NULL
        )"#
    );
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .with_context(|| format!("ensuring {table} exists"))?;
    Ok(())
}

/// `ON CONFLICT (lots) DO NOTHING` — a second tick landing on the same
/// `lots` value is silently dropped. This preserves an acknowledged
/// modelling quirk rather than correcting it; see the notes on the tick
/// primary key being `lots` alone.
pub async fn insert(pool: &PgPool, tick: &Tick) -> Result<()> {
    let table = table_name(&tick.symbol, tick.side);
    let sql =
        format!("INSERT INTO {table} (ticktime, lots, price) VALUES ($1, $2, $3) ON CONFLICT (lots) DO NOTHING");
    sqlx::query(&sql)
        .bind(tick.ticktime)
        .bind(tick.lots)
        .bind(tick.price)
        .execute(pool)
        .await
        .with_context(|| format!("inserting tick into {table}"))?;
    Ok(())
}

pub async fn recent(pool: &PgPool, symbol: &str, side: Side, limit: i64) -> Result<Vec<Tick>> {
    let table = table_name(symbol, side);
    let sql = format!("SELECT ticktime, lots, price FROM {table} ORDER BY ticktime DESC LIMIT $1");
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("reading recent ticks from {table}"))?;

    Ok(rows
        .into_iter()
        .map(|row| Tick {
            symbol: symbol.to_string(),
            side,
            ticktime: row.get("ticktime"),
            lots: row.get("lots"),
            price: row.get("price"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_lowercases_symbol() {
        assert_eq!(table_name("EURUSD", Side::Bid), "ticks_eurusd_bid");
        assert_eq!(table_name("eurusd", Side::Ask), "ticks_eurusd_ask");
    }
}
