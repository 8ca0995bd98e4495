//! NSDP Core - Wire format and codec for the switch discovery protocol
//!
//! This crate is pure: no sockets, no clocks beyond reply timestamps.
//! - Wire layout of message and record headers
//! - Record type registry and value decoding/encoding
//! - Packet builder for outgoing requests
//! - Bounds-checked parser for received messages
//! - Decoded reply model

pub mod builder;
pub mod device;
pub mod parser;
pub mod record;
pub mod wire;

pub use builder::{BuilderError, PacketBuilder, SequenceGenerator};
pub use device::{Reply, SwitchInfo};
pub use parser::{Packet, ParseError, Record, Records};
pub use pnet::util::MacAddr;
pub use record::{DecodeError, RecordType, RecordValue, UnknownProperty, ValueKind};
pub use wire::{MessageHeader, Operation, RecordHeader, BROADCAST_MAC};
