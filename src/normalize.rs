//! Raw-entry-to-tick normalization: lot computation and time stamping.

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::models::{RawQuote, Tick};

/// Turn a raw repeating-group entry into a persisted tick. Fails if the
/// symbol's contract size isn't known — callers retry and eventually
/// drop the job rather than guess a granularity.
pub fn normalize(quote: &RawQuote, contract_size: Option<f64>) -> Result<Tick> {
    let contract_size = contract_size
        .ok_or_else(|| anyhow!("no contract size known for symbol {}", quote.symbol))?;
    if contract_size == 0.0 {
        return Err(anyhow!("contract size for {} is zero", quote.symbol));
    }

    let lots = (quote.size / contract_size).round() as i32;

    let ticktime = match quote.source_time {
        Some(time) => Utc::now().date_naive().and_time(time).and_utc(),
        None => Utc::now(),
    };

    Ok(Tick {
        symbol: quote.symbol.clone(),
        side: quote.side,
        ticktime,
        lots,
        price: quote.price,
    })
}
