//! Record type registry and value codec

use bytes::Bytes;
use pnet::util::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

use crate::wire::{mac_from_slice, mac_octets};

/// Errors decoding a single record value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record_type} value must be {expected} bytes, got {actual}")]
    LengthMismatch {
        record_type: RecordType,
        expected: usize,
        actual: usize,
    },
    #[error("{record_type} value byte {value:#04x} is not a valid boolean")]
    InvalidValue { record_type: RecordType, value: u8 },
}

/// How a record's value bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Raw bytes, any length, no encoding guarantee
    Text,
    /// Exactly six bytes
    MacAddress,
    /// Exactly four bytes, network order
    Ipv4,
    /// Exactly one byte, 0 or 1
    Boolean,
    /// Exactly one byte
    Integer,
    /// Uninterpreted
    Opaque,
}

/// Known record types. Codes outside the registry are kept in `Unknown`.
///
/// Only [`RecordType::from`] and [`RecordType::canonical`] guarantee that a
/// registered code maps to its named variant; a hand-built `Unknown(0x0003)`
/// compares unequal to `Name` until it is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    Model,
    Name,
    MacAddress,
    Ipv4,
    NewPassword,
    Password,
    Dhcp,
    Firmware,
    Reboot,
    LinkSpeed,
    PortStatistics,
    VlanSupport,
    PortCount,
    Tail,
    Unknown(u16),
}

impl RecordType {
    /// Every registered type, in code order
    pub const ALL: [RecordType; 14] = [
        RecordType::Model,
        RecordType::Name,
        RecordType::MacAddress,
        RecordType::Ipv4,
        RecordType::NewPassword,
        RecordType::Password,
        RecordType::Dhcp,
        RecordType::Firmware,
        RecordType::Reboot,
        RecordType::LinkSpeed,
        RecordType::PortStatistics,
        RecordType::VlanSupport,
        RecordType::PortCount,
        RecordType::Tail,
    ];

    /// The named variant for this code, if it has one
    pub fn canonical(self) -> Self {
        RecordType::from(self.code())
    }

    pub fn code(self) -> u16 {
        match self {
            RecordType::Model => 0x0001,
            RecordType::Name => 0x0003,
            RecordType::MacAddress => 0x0004,
            RecordType::Ipv4 => 0x0006,
            RecordType::NewPassword => 0x0009,
            RecordType::Password => 0x000a,
            RecordType::Dhcp => 0x000b,
            RecordType::Firmware => 0x000d,
            RecordType::Reboot => 0x0013,
            RecordType::LinkSpeed => 0x0c00,
            RecordType::PortStatistics => 0x1000,
            RecordType::VlanSupport => 0x2000,
            RecordType::PortCount => 0x6000,
            RecordType::Tail => 0xffff,
            RecordType::Unknown(code) => code,
        }
    }

    /// Human-readable label used when printing records
    pub fn label(self) -> &'static str {
        match self {
            RecordType::Model => "Model",
            RecordType::Name => "Name",
            RecordType::MacAddress => "MAC",
            RecordType::Ipv4 => "IP",
            RecordType::NewPassword => "New password",
            RecordType::Password => "Password",
            RecordType::Dhcp => "DHCP enabled",
            RecordType::Firmware => "Firmware",
            RecordType::Reboot => "Reboot",
            RecordType::LinkSpeed => "Link speed",
            RecordType::PortStatistics => "Port statistics",
            RecordType::VlanSupport => "VLAN support",
            RecordType::PortCount => "Num of ports",
            RecordType::Tail => "End of message",
            RecordType::Unknown(_) => "Unknown",
        }
    }

    /// Short property name accepted on the command line
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            RecordType::Model => "model",
            RecordType::Name => "name",
            RecordType::MacAddress => "mac",
            RecordType::Ipv4 => "ip",
            RecordType::NewPassword => "new-password",
            RecordType::Password => "password",
            RecordType::Dhcp => "dhcp",
            RecordType::Firmware => "firmware",
            RecordType::Reboot => "reboot",
            RecordType::LinkSpeed => "speed",
            RecordType::PortStatistics => "port-stats",
            RecordType::VlanSupport => "vlan",
            RecordType::PortCount => "ports",
            RecordType::Tail | RecordType::Unknown(_) => return None,
        })
    }

    pub fn kind(self) -> ValueKind {
        match self {
            RecordType::Model
            | RecordType::Name
            | RecordType::NewPassword
            | RecordType::Password
            | RecordType::Firmware => ValueKind::Text,
            RecordType::MacAddress => ValueKind::MacAddress,
            RecordType::Ipv4 => ValueKind::Ipv4,
            RecordType::Dhcp => ValueKind::Boolean,
            RecordType::PortCount => ValueKind::Integer,
            RecordType::Reboot
            | RecordType::LinkSpeed
            | RecordType::PortStatistics
            | RecordType::VlanSupport
            | RecordType::Tail
            | RecordType::Unknown(_) => ValueKind::Opaque,
        }
    }
}

impl From<u16> for RecordType {
    fn from(code: u16) -> Self {
        RecordType::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .unwrap_or(RecordType::Unknown(code))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Unknown(code) => write!(f, "record {:#06x}", code),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Unrecognized property name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown property '{0}'")]
pub struct UnknownProperty(pub String);

impl FromStr for RecordType {
    type Err = UnknownProperty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        RecordType::ALL
            .into_iter()
            .find(|t| t.name() == Some(wanted.as_str()))
            .ok_or(UnknownProperty(s.to_string()))
    }
}

/// A decoded record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValue {
    Text(Bytes),
    MacAddress(MacAddr),
    Ipv4(Ipv4Addr),
    Boolean(bool),
    Integer(u8),
    Opaque(Bytes),
}

impl RecordValue {
    /// Canonical wire bytes of this value
    pub fn encode(&self) -> Bytes {
        match self {
            RecordValue::Text(bytes) | RecordValue::Opaque(bytes) => bytes.clone(),
            RecordValue::MacAddress(mac) => Bytes::copy_from_slice(&mac_octets(*mac)),
            RecordValue::Ipv4(ip) => Bytes::copy_from_slice(&ip.octets()),
            RecordValue::Boolean(value) => Bytes::copy_from_slice(&[u8::from(*value)]),
            RecordValue::Integer(value) => Bytes::copy_from_slice(&[*value]),
        }
    }

    /// Text content up to the first NUL, decoded lossily
    pub fn as_text(&self) -> Option<String> {
        match self {
            RecordValue::Text(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            _ => None,
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Text(_) => write!(f, "{}", self.as_text().unwrap_or_default()),
            RecordValue::MacAddress(mac) => write!(f, "{}", mac),
            RecordValue::Ipv4(ip) => write!(f, "{}", ip),
            RecordValue::Boolean(value) => write!(f, "{}", value),
            RecordValue::Integer(value) => write!(f, "{}", value),
            RecordValue::Opaque(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

/// Decode the value bytes of a record according to its type
pub fn decode(record_type: RecordType, value: &[u8]) -> Result<RecordValue, DecodeError> {
    decode_bytes(record_type, Bytes::copy_from_slice(value))
}

/// Like [`decode`], but text and opaque values share `value`'s buffer
pub fn decode_bytes(record_type: RecordType, value: Bytes) -> Result<RecordValue, DecodeError> {
    let actual = value.len();
    let expect_len = |expected: usize| {
        if actual == expected {
            Ok(())
        } else {
            Err(DecodeError::LengthMismatch {
                record_type,
                expected,
                actual,
            })
        }
    };

    match record_type.kind() {
        ValueKind::Text => Ok(RecordValue::Text(value)),
        ValueKind::MacAddress => {
            expect_len(6)?;
            Ok(RecordValue::MacAddress(mac_from_slice(&value)))
        }
        ValueKind::Ipv4 => {
            expect_len(4)?;
            Ok(RecordValue::Ipv4(Ipv4Addr::new(value[0], value[1], value[2], value[3])))
        }
        ValueKind::Boolean => {
            expect_len(1)?;
            match value[0] {
                0 => Ok(RecordValue::Boolean(false)),
                1 => Ok(RecordValue::Boolean(true)),
                other => Err(DecodeError::InvalidValue {
                    record_type,
                    value: other,
                }),
            }
        }
        ValueKind::Integer => {
            expect_len(1)?;
            Ok(RecordValue::Integer(value[0]))
        }
        ValueKind::Opaque => Ok(RecordValue::Opaque(value)),
    }
}
