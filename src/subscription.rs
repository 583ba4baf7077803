//! Market Data Request construction and dispatch.

use uuid::Uuid;

use crate::fix::{tags, OutboundMessage};
use crate::models::CurrencyPair;

/// Build the Market Data Request (`35=V`) for a single eligible pair.
/// One request per pair; callers must not batch symbols into one `55`.
pub fn market_data_request(
    pair: &CurrencyPair,
    sender_comp_id: &str,
    target_comp_id: &str,
    seq_num: u64,
    sending_time: &str,
) -> OutboundMessage {
    let req_id = format!("MDR_{}", Uuid::new_v4());
    OutboundMessage::new("V", sender_comp_id, target_comp_id, seq_num, sending_time)
        .push(tags::MD_REQ_ID, req_id)
        .push(tags::SUBSCRIPTION_REQUEST_TYPE, "1")
        .push(tags::MARKET_DEPTH, "0")
        .push(tags::NO_MD_ENTRY_TYPES, "2")
        .push(tags::MD_ENTRY_TYPE, "0")
        .push(tags::MD_ENTRY_TYPE, "1")
        .push(tags::NO_RELATED_SYM, "1")
        .push(tags::SYMBOL, pair.symbol.clone())
}

/// Build one request per eligible pair in catalog order. Re-subscription
/// only ever happens via a full session reconnect, so this is a single
/// pass with no batching and no dedup state to carry between calls.
pub fn requests_for_eligible_pairs(
    pairs: &[CurrencyPair],
    sender_comp_id: &str,
    target_comp_id: &str,
    next_seq_num: &mut u64,
    sending_time: &str,
) -> Vec<OutboundMessage> {
    pairs
        .iter()
        .filter(|pair| pair.is_eligible())
        .map(|pair| {
            let msg = market_data_request(
                pair,
                sender_comp_id,
                target_comp_id,
                *next_seq_num,
                sending_time,
            );
            *next_seq_num += 1;
            msg
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::encode;

    #[test]
    fn request_carries_both_entry_types_and_one_symbol() {
        let pair = CurrencyPair {
            symbol: "EURUSD".into(),
            contract_size: Some(100_000.0),
        };
        let msg = market_data_request(&pair, "SENDER", "TARGET", 2, "20260101-00:00:00");

        let entry_types: Vec<&str> = msg
            .fields
            .iter()
            .filter(|(tag, _)| *tag == tags::MD_ENTRY_TYPE)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(entry_types, vec!["0", "1"]);

        let symbols: Vec<&str> = msg
            .fields
            .iter()
            .filter(|(tag, _)| *tag == tags::SYMBOL)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(symbols, vec!["EURUSD"]);
    }

    #[test]
    fn ineligible_pairs_are_skipped_and_seq_num_advances_per_request() {
        let pairs = vec![
            CurrencyPair {
                symbol: "EURUSD".into(),
                contract_size: Some(100_000.0),
            },
            CurrencyPair {
                symbol: "XYZABC".into(),
                contract_size: None,
            },
            CurrencyPair {
                symbol: "GBPUSD".into(),
                contract_size: Some(100_000.0),
            },
        ];
        let mut seq = 2u64;
        let requests =
            requests_for_eligible_pairs(&pairs, "SENDER", "TARGET", &mut seq, "20260101-00:00:00");

        assert_eq!(requests.len(), 2);
        assert_eq!(seq, 4);
        // Each request encodes without panicking and carries a unique MDReqID.
        let encoded: Vec<_> = requests.iter().map(encode).collect();
        assert_eq!(encoded.len(), 2);
        assert_ne!(
            requests[0]
                .fields
                .iter()
                .find(|(t, _)| *t == tags::MD_REQ_ID),
            requests[1]
                .fields
                .iter()
                .find(|(t, _)| *t == tags::MD_REQ_ID)
        );
    }
}
