//! End-to-end protocol scenarios: a logon handshake, a market data
//! snapshot carrying BID/ASK entries, and the resulting tick/candle
//! sequence, exercised purely at the wire + domain-logic layer (no live
//! Postgres/Redis — those are covered by the per-module unit tests).

use chrono::{NaiveTime, TimeZone, Utc};
use ingest_client::fix::{self, tags, FixDecoder, OutboundMessage};
use ingest_client::models::{Candle, CurrencyPair, RawQuote, Side, Timeframe};
use ingest_client::normalize::normalize;
use ingest_client::subscription::requests_for_eligible_pairs;

#[test]
fn logon_handshake_then_subscription_dispatch() {
    // Client -> server: Logon with the fields the spec pins down exactly.
    let logon = OutboundMessage::new("A", "CLIENT", "VENUE", 1, "20260101-00:00:00")
        .push(tags::ENCRYPT_METHOD, "0")
        .push(tags::HEART_BT_INT, "30")
        .push(tags::RESET_SEQ_NUM_FLAG, "Y")
        .push(tags::USERNAME, "trader")
        .push(tags::PASSWORD, "secret");
    let wire = fix::encode(&logon);

    let mut decoder = FixDecoder::new();
    decoder.feed(&wire);
    let decoded = decoder.next_message().expect("logon frame");
    assert_eq!(decoded.msg_type(), "A");
    assert_eq!(decoded.field(tags::MSG_SEQ_NUM), Some("1"));
    assert_eq!(decoded.field(tags::ENCRYPT_METHOD), Some("0"));
    assert_eq!(decoded.field(tags::HEART_BT_INT), Some("30"));
    assert_eq!(decoded.field(tags::RESET_SEQ_NUM_FLAG), Some("Y"));

    // Server -> client: Logon response with its own seq 1. Engine would
    // transition to LoggedOn here and, 1s later, dispatch one MD request
    // per eligible pair.
    let pairs = vec![
        CurrencyPair { symbol: "eurusd".into(), contract_size: Some(100_000.0) },
        CurrencyPair { symbol: "xyzabc".into(), contract_size: None }, // ineligible
        CurrencyPair { symbol: "gbpusd".into(), contract_size: Some(100_000.0) },
    ];
    let mut seq = 2u64;
    let requests = requests_for_eligible_pairs(&pairs, "CLIENT", "VENUE", &mut seq, "20260101-00:00:01");

    assert_eq!(requests.len(), 2, "ineligible pair must not be subscribed");
    assert_eq!(seq, 4);
    for request in &requests {
        let symbols: Vec<&str> = request
            .fields
            .iter()
            .filter(|(tag, _)| *tag == tags::SYMBOL)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(symbols.len(), 1, "one symbol per request, no batching");
    }
}

#[test]
fn bid_snapshot_drives_tick_and_m1_candle_lifecycle() {
    // Spec scenario 2-5: three BID ticks in the same M1 bucket, then a
    // rollover into the next bucket.
    let contract_size = Some(100_000.0);

    let tick1 = build_tick("eurusd", 1.10000, 100_000.0, "12:00:30", contract_size);
    assert_eq!(tick1.lots, 1);
    assert_eq!(tick1.ticktime.time(), NaiveTime::from_hms_opt(12, 0, 30).unwrap());

    let bucket = Timeframe::M1.candletime_for(tick1.ticktime);
    let mut candle = Candle::opening(tick1.symbol.clone(), Timeframe::M1, bucket, tick1.price);
    assert_eq!(
        candle,
        Candle { symbol: "eurusd".into(), timeframe: Timeframe::M1, lots: 1, candletime: bucket, open: 1.10000, high: 1.10000, low: 1.10000, close: 1.10000 }
    );

    let tick2 = build_tick("eurusd", 1.10050, 100_000.0, "12:00:45", contract_size);
    assert_eq!(Timeframe::M1.candletime_for(tick2.ticktime), bucket);
    candle.apply_tick(tick2.price);
    assert_eq!((candle.open, candle.high, candle.low, candle.close), (1.10000, 1.10050, 1.10000, 1.10050));

    let tick3 = build_tick("eurusd", 1.09990, 100_000.0, "12:00:55", contract_size);
    assert_eq!(Timeframe::M1.candletime_for(tick3.ticktime), bucket);
    candle.apply_tick(tick3.price);
    assert_eq!((candle.open, candle.high, candle.low, candle.close), (1.10000, 1.10050, 1.09990, 1.09990));
    assert!(candle.low <= candle.open && candle.open <= candle.high);
    assert!(candle.low <= candle.close && candle.close <= candle.high);

    // Bucket rollover: a tick a minute later starts a fresh candle; the
    // 12:00:00 bucket is never touched again.
    let tick4 = build_tick("eurusd", 1.10010, 100_000.0, "12:01:02", contract_size);
    let next_bucket = Timeframe::M1.candletime_for(tick4.ticktime);
    assert_ne!(next_bucket, bucket);
    let next_candle = Candle::opening(tick4.symbol.clone(), Timeframe::M1, next_bucket, tick4.price);
    assert_eq!(next_candle.open, 1.10010);
}

#[test]
fn unknown_contract_size_tick_is_rejected_not_silently_dropped_to_zero_lots() {
    let quote = RawQuote {
        symbol: "xyzabc".into(),
        side: Side::Bid,
        price: 1.0,
        size: 100_000.0,
        source_time: None,
        req_id: "MDR_test".into(),
    };
    let result = normalize(&quote, None);
    assert!(result.is_err());
}

#[test]
fn empty_snapshot_produces_no_groups() {
    let msg = OutboundMessage::new("W", "VENUE", "CLIENT", 9, "20260101-00:00:09")
        .push(tags::SYMBOL, "EURUSD")
        .push(tags::NO_MD_ENTRIES, "0");
    let wire = fix::encode(&msg);

    let mut decoder = FixDecoder::new();
    decoder.feed(&wire);
    let decoded = decoder.next_message().unwrap();
    assert!(decoded.groups.is_empty());
}

fn build_tick(
    symbol: &str,
    price: f64,
    size: f64,
    hms: &str,
    contract_size: Option<f64>,
) -> ingest_client::models::Tick {
    let time = NaiveTime::parse_from_str(hms, "%H:%M:%S").unwrap();
    let quote = RawQuote {
        symbol: symbol.to_string(),
        side: Side::Bid,
        price,
        size,
        source_time: Some(time),
        req_id: "MDR_test".into(),
    };
    normalize(&quote, contract_size).unwrap()
}

#[test]
fn sanity_today_anchor_is_utc() {
    // Guards the documented quirk: HH:MM:SS is anchored to "today" in
    // UTC, not corrected against tag 52. This just confirms the anchor
    // date matches Utc::now(), not local time or tag-52 sending time.
    let now = Utc::now();
    let anchored = Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap());
    assert_eq!(anchored.date_naive(), now.date_naive());
}
