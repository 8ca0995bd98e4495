//! Decoded replies from switches

use chrono::{DateTime, Utc};
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::parser::Packet;
use crate::record::{DecodeError, RecordType, RecordValue};
use crate::wire::MessageHeader;

/// One switch's answer to a request
#[derive(Debug, Clone)]
pub struct Reply {
    pub header: MessageHeader,
    /// When the datagram was received
    pub received_at: DateTime<Utc>,
    /// Successfully decoded records in wire order. Per-port properties
    /// such as link speed repeat their type once per port.
    pub values: Vec<(RecordType, RecordValue)>,
    /// Records whose value did not match their type
    pub malformed: Vec<(RecordType, DecodeError)>,
}

impl Reply {
    /// Decode every record of a parsed packet.
    ///
    /// A record that fails to decode is set aside in `malformed` and does not
    /// affect its siblings.
    pub fn from_packet(packet: &Packet) -> Self {
        let mut values = Vec::new();
        let mut malformed = Vec::new();

        for record in packet.records() {
            match record.decode() {
                Ok(value) => {
                    values.push((record.record_type, value));
                }
                Err(e) => malformed.push((record.record_type, e)),
            }
        }

        Self {
            header: *packet.header(),
            received_at: Utc::now(),
            values,
            malformed,
        }
    }

    /// First value of the given type
    pub fn get(&self, record_type: RecordType) -> Option<&RecordValue> {
        self.get_all(record_type).next()
    }

    /// Every value of the given type, in wire order
    pub fn get_all(&self, record_type: RecordType) -> impl Iterator<Item = &RecordValue> + '_ {
        self.values
            .iter()
            .filter(move |(t, _)| *t == record_type)
            .map(|(_, v)| v)
    }

    /// Whether this reply echoes the sequence number of a request
    pub fn is_response_to(&self, sequence: u16) -> bool {
        self.header.sequence == sequence
    }

    fn text(&self, record_type: RecordType) -> Option<String> {
        self.get(record_type).and_then(RecordValue::as_text)
    }

    pub fn model(&self) -> Option<String> {
        self.text(RecordType::Model)
    }

    pub fn name(&self) -> Option<String> {
        self.text(RecordType::Name)
    }

    pub fn firmware(&self) -> Option<String> {
        self.text(RecordType::Firmware)
    }

    pub fn mac(&self) -> Option<MacAddr> {
        match self.get(RecordType::MacAddress) {
            Some(RecordValue::MacAddress(mac)) => Some(*mac),
            _ => None,
        }
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self.get(RecordType::Ipv4) {
            Some(RecordValue::Ipv4(ip)) => Some(*ip),
            _ => None,
        }
    }

    pub fn dhcp(&self) -> Option<bool> {
        match self.get(RecordType::Dhcp) {
            Some(RecordValue::Boolean(enabled)) => Some(*enabled),
            _ => None,
        }
    }

    pub fn port_count(&self) -> Option<u8> {
        match self.get(RecordType::PortCount) {
            Some(RecordValue::Integer(count)) => Some(*count),
            _ => None,
        }
    }

    pub fn summary(&self) -> SwitchInfo {
        SwitchInfo {
            source: self.header.source.to_string(),
            sequence: self.header.sequence,
            model: self.model(),
            name: self.name(),
            mac: self.mac().map(|m| m.to_string()),
            ip: self.ip(),
            dhcp: self.dhcp(),
            firmware: self.firmware(),
            port_count: self.port_count(),
            received_at: self.received_at,
        }
    }
}

/// Flat summary of a switch, suitable for serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchInfo {
    /// Hardware address from the reply header
    pub source: String,
    pub sequence: u16,
    pub model: Option<String>,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub ip: Option<Ipv4Addr>,
    pub dhcp: Option<bool>,
    pub firmware: Option<String>,
    pub port_count: Option<u8>,
    pub received_at: DateTime<Utc>,
}
