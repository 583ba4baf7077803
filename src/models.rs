use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A currency pair as read from the `currpairdetails` catalog. Pairs
/// with `contract_size = None` are kept in the catalog but never
/// subscribed and never produce ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyPair {
    pub symbol: String,
    pub contract_size: Option<f64>,
}

impl CurrencyPair {
    pub fn is_eligible(&self) -> bool {
        self.contract_size.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// `269=0` -> BID, `269=1` -> ASK.
    pub fn from_md_entry_type(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Side::Bid),
            "1" => Some(Side::Ask),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M1,
    H1,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M1, Timeframe::H1, Timeframe::D1];

    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::H1 => 3_600_000,
            Timeframe::D1 => 86_400_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::H1 => "H1",
            Timeframe::D1 => "D1",
        }
    }

    /// `floor(tickTimeMs / durationMs) * durationMs`, expressed back as
    /// a timestamp. `candletime mod duration == 0` by construction.
    pub fn candletime_for(&self, tick_time: DateTime<Utc>) -> DateTime<Utc> {
        let duration = self.duration_ms();
        let bucket = tick_time.timestamp_millis().div_euclid(duration) * duration;
        DateTime::from_timestamp_millis(bucket).unwrap_or(tick_time)
    }
}

/// A single repeating-group entry, carried from the FIX codec into the
/// normalizer. Transient: never persisted as-is.
#[derive(Debug, Clone)]
pub struct RawQuote {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub source_time: Option<NaiveTime>,
    pub req_id: String,
}

/// A normalized, persisted quote observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub side: Side,
    pub ticktime: DateTime<Utc>,
    pub lots: i32,
    pub price: f64,
}

/// A per-timeframe OHLC bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub lots: i16,
    pub candletime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn opening(
        symbol: String,
        timeframe: Timeframe,
        candletime: DateTime<Utc>,
        price: f64,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            lots: 1,
            candletime,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    pub fn apply_tick(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub fix_server: String,
    pub fix_port: u16,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub username: String,
    pub password: String,

    pub pg_host: String,
    pub pg_port: u16,
    pub pg_user: String,
    pub pg_password: String,
    pub pg_database: String,

    pub redis_host: String,
    pub redis_port: u16,

    pub log_level: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let fix_server = std::env::var("FIX_SERVER").unwrap_or_default();
        let fix_port = std::env::var("FIX_PORT")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);
        let sender_comp_id = std::env::var("SENDER_COMP_ID").unwrap_or_default();
        let target_comp_id = std::env::var("TARGET_COMP_ID").unwrap_or_default();
        let username = std::env::var("USERNAME").unwrap_or_default();
        let password = std::env::var("PASSWORD").unwrap_or_default();

        if fix_server.is_empty() || sender_comp_id.is_empty() || username.is_empty() {
            tracing::warn!("FIX credentials are incomplete; connect/logon will fail until configured");
        }

        let pg_host = std::env::var("PG_HOST").unwrap_or_else(|_| "localhost".to_string());
        let pg_port = std::env::var("PG_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .unwrap_or(5432);
        let pg_user = std::env::var("PG_USER").unwrap_or_else(|_| "postgres".to_string());
        let pg_password = std::env::var("PG_PASSWORD").unwrap_or_default();
        let pg_database = std::env::var("PG_DATABASE").unwrap_or_else(|_| "postgres".to_string());

        let redis_host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
        let redis_port = std::env::var("REDIS_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse()
            .unwrap_or(6379);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            fix_server,
            fix_port,
            sender_comp_id,
            target_comp_id,
            username,
            password,
            pg_host,
            pg_port,
            pg_user,
            pg_password,
            pg_database,
            redis_host,
            redis_port,
            log_level,
        })
    }

    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.pg_user, self.pg_password, self.pg_host, self.pg_port, self.pg_database
        )
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parses_only_bid_ask() {
        assert_eq!(Side::from_md_entry_type("0"), Some(Side::Bid));
        assert_eq!(Side::from_md_entry_type("1"), Some(Side::Ask));
        assert_eq!(Side::from_md_entry_type("2"), None);
    }

    #[test]
    fn ineligible_pair_has_no_contract_size() {
        let pair = CurrencyPair {
            symbol: "xyzabc".into(),
            contract_size: None,
        };
        assert!(!pair.is_eligible());
    }

    #[test]
    fn candletime_floors_to_bucket_boundary() {
        let t = "2026-01-01T12:00:45Z".parse::<DateTime<Utc>>().unwrap();
        let bucket = Timeframe::M1.candletime_for(t);
        assert_eq!(bucket.to_rfc3339(), "2026-01-01T12:00:00+00:00");

        let just_before_rollover = "2026-01-01T12:00:59.999Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            Timeframe::M1.candletime_for(just_before_rollover),
            Timeframe::M1.candletime_for(t)
        );

        let rolled_over = "2026-01-01T12:01:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_ne!(
            Timeframe::M1.candletime_for(rolled_over),
            Timeframe::M1.candletime_for(t)
        );
    }

    #[test]
    fn candle_apply_tick_tracks_extrema() {
        let mut candle = Candle::opening("eurusd".into(), Timeframe::M1, Utc::now(), 1.10000);
        candle.apply_tick(1.10050);
        candle.apply_tick(1.09990);
        assert_eq!(candle.open, 1.10000);
        assert_eq!(candle.high, 1.10050);
        assert_eq!(candle.low, 1.09990);
        assert_eq!(candle.close, 1.09990);
    }
}
