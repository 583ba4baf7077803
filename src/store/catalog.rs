//! In-memory currency-pair catalog. Read once at bootstrap, held as an
//! immutable map for the rest of the process; the durable store is only
//! consulted again as a fallback when a symbol is somehow missing.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use sqlx::{PgPool, Row};

use crate::models::CurrencyPair;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    inner: Arc<RwLock<HashMap<String, Option<f64>>>>,
}

impl Catalog {
    pub async fn load(pool: &PgPool) -> Result<Self> {
        let catalog = Self::default();
        catalog.reload(pool).await?;
        Ok(catalog)
    }

    /// Re-reads the full catalog and replaces the in-memory map in
    /// place, so clones held elsewhere (tick jobs, the subscription
    /// dispatcher) observe the refreshed set without needing a new
    /// `Catalog` handed around. Used for the initial load and again as
    /// part of the post-reconnect bootstrap warm-up.
    pub async fn reload(&self, pool: &PgPool) -> Result<()> {
        let rows = sqlx::query("SELECT currpair, contractsize FROM currpairdetails")
            .fetch_all(pool)
            .await
            .context("loading currpairdetails")?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let symbol: String = row.get("currpair");
            let contract_size: Option<f64> = row.get("contractsize");
            map.insert(symbol.to_lowercase(), contract_size);
        }

        *self.inner.write() = map;
        Ok(())
    }

    pub fn pairs(&self) -> Vec<CurrencyPair> {
        self.inner
            .read()
            .iter()
            .map(|(symbol, contract_size)| CurrencyPair {
                symbol: symbol.clone(),
                contract_size: *contract_size,
            })
            .collect()
    }

    pub fn eligible_pairs(&self) -> Vec<CurrencyPair> {
        self.pairs().into_iter().filter(|p| p.is_eligible()).collect()
    }

    pub fn contract_size(&self, symbol: &str) -> Option<f64> {
        self.inner.read().get(&symbol.to_lowercase()).copied().flatten()
    }

    /// Fallback for the rare case a symbol isn't in the in-memory map at
    /// all (not merely null) — re-reads the durable catalog for that one
    /// row and caches the result.
    pub async fn refresh_from_store(&self, pool: &PgPool, symbol: &str) -> Result<Option<f64>> {
        let row = sqlx::query("SELECT contractsize FROM currpairdetails WHERE currpair = $1")
            .bind(symbol)
            .fetch_optional(pool)
            .await
            .context("fallback contract size lookup")?;

        let contract_size = row.and_then(|r| r.get::<Option<f64>, _>("contractsize"));
        self.inner
            .write()
            .insert(symbol.to_lowercase(), contract_size);
        Ok(contract_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_pairs_excludes_null_contract_size() {
        let mut map = HashMap::new();
        map.insert("eurusd".to_string(), Some(100_000.0));
        map.insert("xyzabc".to_string(), None);
        let catalog = Catalog {
            inner: Arc::new(RwLock::new(map)),
        };

        let eligible = catalog.eligible_pairs();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].symbol, "eurusd");
        assert_eq!(catalog.contract_size("xyzabc"), None);
        assert_eq!(catalog.contract_size("missing"), None);
    }
}
