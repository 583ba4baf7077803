//! FIX 4.4 wire encoding/decoding: checksum, body length, streaming
//! frame extraction, and repeating-group parsing for market data
//! messages.

use std::collections::HashMap;

use super::message::{InboundMessage, MdEntry, OutboundMessage};
use super::tags::{self, SOH};

/// Encode a message into its wire form, computing body length and
/// checksum from the bytes actually emitted (not a character count).
pub fn encode(msg: &OutboundMessage) -> Vec<u8> {
    let mut body = Vec::new();
    let mut push_field = |body: &mut Vec<u8>, tag: u32, value: &str| {
        body.extend_from_slice(tag.to_string().as_bytes());
        body.push(b'=');
        body.extend_from_slice(value.as_bytes());
        body.push(SOH);
    };

    let seq_num = msg.seq_num.to_string();
    for tag in tags::HEADER_ORDER {
        let value: &str = match tag {
            tags::MSG_TYPE => msg.msg_type,
            tags::SENDER_COMP_ID => &msg.sender_comp_id,
            tags::TARGET_COMP_ID => &msg.target_comp_id,
            tags::MSG_SEQ_NUM => &seq_num,
            tags::SENDING_TIME => &msg.sending_time,
            _ => unreachable!("HEADER_ORDER only lists the five header tags above"),
        };
        push_field(&mut body, tag, value);
    }
    for (tag, value) in &msg.fields {
        push_field(&mut body, *tag, value);
    }

    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(format!("{}=FIX.4.4", tags::BEGIN_STRING).as_bytes());
    out.push(SOH);
    out.extend_from_slice(format!("{}={}", tags::BODY_LENGTH, body.len()).as_bytes());
    out.push(SOH);
    out.extend_from_slice(&body);

    let checksum = checksum_of(&out);
    out.extend_from_slice(format!("{}={checksum:03}", tags::CHECK_SUM).as_bytes());
    out.push(SOH);
    out
}

fn checksum_of(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| b as u32).sum::<u32>() % 256
}

/// Streaming frame extractor. Feed it bytes as they arrive off the
/// socket; call `next_message` in a loop to drain every complete frame
/// currently buffered. Trailing partial bytes are kept for the next
/// `feed`.
#[derive(Debug, Default)]
pub struct FixDecoder {
    buffer: Vec<u8>,
}

impl FixDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete frame from the buffer, if any.
    pub fn next_message(&mut self) -> Option<InboundMessage> {
        let start = find_subslice(&self.buffer, b"8=FIX")?;
        let region = &self.buffer[start..];

        // Terminator pattern: SOH "10=" ... SOH
        let rel_checksum_tag = find_subslice(region, &[SOH, b'1', b'0', b'='])?;
        let after_tag = rel_checksum_tag + 4;
        let rel_end_soh = find_byte(&region[after_tag..], SOH)?;
        let end = start + after_tag + rel_end_soh + 1;

        let frame = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Some(parse_frame(&frame))
    }
}

fn parse_frame(frame: &[u8]) -> InboundMessage {
    let text = String::from_utf8_lossy(frame);
    let mut fields: HashMap<u32, String> = HashMap::new();
    let mut raw_pairs: Vec<(u32, String)> = Vec::new();

    for field in text.split(SOH as char) {
        if field.is_empty() {
            continue;
        }
        let Some((tag_str, value)) = field.split_once('=') else {
            continue; // malformed tag=value: skip silently
        };
        let Ok(tag) = tag_str.parse::<u32>() else {
            continue;
        };
        fields.insert(tag, value.to_string());
        raw_pairs.push((tag, value.to_string()));
    }

    let msg_type = fields.get(&tags::MSG_TYPE).cloned().unwrap_or_default();
    let groups = if msg_type == "W" || msg_type == "X" {
        extract_groups(&raw_pairs)
    } else {
        Vec::new()
    };

    InboundMessage { fields, groups }
}

fn extract_groups(raw_pairs: &[(u32, String)]) -> Vec<MdEntry> {
    let mut groups = Vec::new();
    let mut current: Option<MdEntry> = None;

    for (tag, value) in raw_pairs {
        match *tag {
            tags::MD_ENTRY_TYPE => {
                if let Some(entry) = current.take() {
                    groups.push(entry);
                }
                current = Some(MdEntry {
                    entry_type: Some(value.clone()),
                    ..Default::default()
                });
            }
            tags::MD_ENTRY_PX => {
                if let Some(entry) = current.as_mut() {
                    entry.px = value.parse().ok();
                }
            }
            tags::MD_ENTRY_SIZE => {
                if let Some(entry) = current.as_mut() {
                    entry.size = value.parse().ok();
                }
            }
            tags::MD_ENTRY_TIME => {
                if let Some(entry) = current.as_mut() {
                    entry.time = Some(value.clone());
                }
            }
            _ => {}
        }
    }
    if let Some(entry) = current.take() {
        groups.push(entry);
    }
    groups
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_byte(haystack: &[u8], byte: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == byte)
}
