//! Typed representations of inbound and outbound FIX 4.4 messages.
//!
//! Dynamic `tag -> value` maps from a naive port become these two
//! structs: one for what we send (header order is enforced by
//! construction), one for what we parse (a flat map plus the
//! repeating-group entries the codec pulled out of it).

use std::collections::HashMap;

use super::tags;

/// A message this client is about to send. Header fields are explicit
/// struct fields so the encoder can place them in the required order;
/// everything else rides in `fields`, in insertion order.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub msg_type: &'static str,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub seq_num: u64,
    pub sending_time: String,
    pub fields: Vec<(u32, String)>,
}

impl OutboundMessage {
    pub fn new(
        msg_type: &'static str,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
        seq_num: u64,
        sending_time: impl Into<String>,
    ) -> Self {
        Self {
            msg_type,
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            seq_num,
            sending_time: sending_time.into(),
            fields: Vec::new(),
        }
    }

    pub fn push(mut self, tag: u32, value: impl Into<String>) -> Self {
        self.fields.push((tag, value.into()));
        self
    }
}

/// A single entry inside a Market Data Snapshot/Refresh repeating group.
/// Only the four tags the spec cares about (269/270/271/273) are kept;
/// everything else in the entry is dropped at the grouping stage but
/// still lives in the parent message's flat field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdEntry {
    pub entry_type: Option<String>,
    pub px: Option<f64>,
    pub size: Option<f64>,
    pub time: Option<String>,
}

impl MdEntry {
    /// `269 ∈ {0, 1}` — BID or ASK. Anything else is dropped downstream.
    pub fn is_bid_or_ask(&self) -> bool {
        matches!(self.entry_type.as_deref(), Some("0") | Some("1"))
    }

    pub fn is_bid(&self) -> bool {
        self.entry_type.as_deref() == Some("0")
    }
}

/// A parsed inbound message: the flat field map plus, for `W`/`X`
/// messages, the ordered repeating-group entries.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub fields: HashMap<u32, String>,
    pub groups: Vec<MdEntry>,
}

impl InboundMessage {
    pub fn msg_type(&self) -> &str {
        self.fields
            .get(&tags::MSG_TYPE)
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn field(&self, tag: u32) -> Option<&str> {
        self.fields.get(&tag).map(|s| s.as_str())
    }

    pub fn seq_num(&self) -> Option<u64> {
        self.field(tags::MSG_SEQ_NUM).and_then(|v| v.parse().ok())
    }

    pub fn symbol(&self) -> Option<&str> {
        self.field(tags::SYMBOL)
    }

    pub fn text(&self) -> Option<&str> {
        self.field(tags::TEXT)
    }
}

/// Human label for a message type code, for logging. Unknown codes are
/// passed through rather than rejected.
pub fn describe_msg_type(code: &str) -> String {
    let label = match code {
        "0" => "Heartbeat",
        "1" => "TestRequest",
        "2" => "ResendRequest",
        "3" => "Reject",
        "4" => "SequenceReset",
        "5" => "Logout",
        "A" => "Logon",
        "V" => "MarketDataRequest",
        "W" => "MarketDataSnapshotFullRefresh",
        "X" => "MarketDataIncrementalRefresh",
        _ => return format!("Unknown ({code})"),
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md_entry_filters_unknown_types() {
        let bid = MdEntry {
            entry_type: Some("0".into()),
            ..Default::default()
        };
        let ask = MdEntry {
            entry_type: Some("1".into()),
            ..Default::default()
        };
        let trade = MdEntry {
            entry_type: Some("2".into()),
            ..Default::default()
        };

        assert!(bid.is_bid_or_ask());
        assert!(bid.is_bid());
        assert!(ask.is_bid_or_ask());
        assert!(!ask.is_bid());
        assert!(!trade.is_bid_or_ask());
    }

    #[test]
    fn describe_msg_type_passes_through_unknown() {
        assert_eq!(describe_msg_type("A"), "Logon");
        assert_eq!(describe_msg_type("Z"), "Unknown (Z)");
    }
}
