//! Minimal FIX 4.4 engine: tag dictionary, typed messages and a
//! streaming-safe wire codec. Scoped to the handful of message types
//! this client sends and receives — not a general FIX library.

pub mod codec;
pub mod message;
pub mod tags;

pub use codec::{encode, FixDecoder};
pub use message::{describe_msg_type, InboundMessage, MdEntry, OutboundMessage};
