//! Wire layout of NSDP messages
//!
//! Every message is a fixed 32-byte header followed by a list of
//! type-length-value records. Multi-byte integers are big-endian.
//!
//! ```text
//!  0       1       2               8              14              20      22      24      28      32
//! +-------+-------+---------------+--------------+---------------+-------+-------+-------+-------+
//! |  ver  |  op   |   reserved    |  source MAC  |  dest MAC     | rsvd  |  seq  | "NSDP"| rsvd  |
//! +-------+-------+---------------+--------------+---------------+-------+-------+-------+-------+
//! ```

use pnet::util::MacAddr;

use crate::parser::ParseError;

/// Protocol version written into every outgoing header
pub const PROTOCOL_VERSION: u8 = 1;

/// Literal signature carried at bytes 24..28 of the header
pub const SIGNATURE: [u8; 4] = *b"NSDP";

/// Size of the fixed message header
pub const MESSAGE_HEADER_LEN: usize = 32;

/// Size of a record header (type + length)
pub const RECORD_HEADER_LEN: usize = 4;

/// UDP port switches listen on for requests
pub const DEVICE_PORT: u16 = 63322;

/// UDP port the client listens on for replies
pub const CLIENT_PORT: u16 = 63321;

/// Receive buffer size for a single reply datagram
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// Destination hardware address used for discovery
pub const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Byte offsets of the header fields
mod offset {
    pub const VERSION: usize = 0;
    pub const OPERATION: usize = 1;
    pub const SOURCE: usize = 8;
    pub const DESTINATION: usize = 14;
    pub const SEQUENCE: usize = 22;
    pub const SIGNATURE: usize = 24;
}

/// Message operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadRequest,
    ReadResponse,
    WriteRequest,
    WriteResponse,
    /// Code outside the known set, kept so callers can report it
    Unknown(u8),
}

impl Operation {
    pub fn code(self) -> u8 {
        match self {
            Operation::ReadRequest => 1,
            Operation::ReadResponse => 2,
            Operation::WriteRequest => 3,
            Operation::WriteResponse => 4,
            Operation::Unknown(code) => code,
        }
    }

    pub fn is_response(self) -> bool {
        matches!(self, Operation::ReadResponse | Operation::WriteResponse)
    }
}

impl From<u8> for Operation {
    fn from(code: u8) -> Self {
        match code {
            1 => Operation::ReadRequest,
            2 => Operation::ReadResponse,
            3 => Operation::WriteRequest,
            4 => Operation::WriteResponse,
            other => Operation::Unknown(other),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::ReadRequest => write!(f, "read-request"),
            Operation::ReadResponse => write!(f, "read-response"),
            Operation::WriteRequest => write!(f, "write-request"),
            Operation::WriteResponse => write!(f, "write-response"),
            Operation::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u8,
    pub operation: Operation,
    pub source: MacAddr,
    pub destination: MacAddr,
    pub sequence: u16,
    pub signature: [u8; 4],
}

impl MessageHeader {
    /// Header for an outgoing message with the current version and signature
    pub fn new(operation: Operation, source: MacAddr, destination: MacAddr, sequence: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            operation,
            source,
            destination,
            sequence,
            signature: SIGNATURE,
        }
    }

    /// Encode into the 32-byte wire form; reserved bytes are zero
    pub fn encode(&self) -> [u8; MESSAGE_HEADER_LEN] {
        let mut bytes = [0u8; MESSAGE_HEADER_LEN];
        bytes[offset::VERSION] = self.version;
        bytes[offset::OPERATION] = self.operation.code();
        bytes[offset::SOURCE..offset::SOURCE + 6].copy_from_slice(&mac_octets(self.source));
        bytes[offset::DESTINATION..offset::DESTINATION + 6]
            .copy_from_slice(&mac_octets(self.destination));
        bytes[offset::SEQUENCE..offset::SEQUENCE + 2].copy_from_slice(&self.sequence.to_be_bytes());
        bytes[offset::SIGNATURE..offset::SIGNATURE + 4].copy_from_slice(&self.signature);
        bytes
    }

    /// Decode the header from the front of `bytes`.
    ///
    /// Only the length is validated. A foreign signature or version is
    /// returned as-is for the caller to inspect.
    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let header = bytes
            .get(..MESSAGE_HEADER_LEN)
            .ok_or(ParseError::TooShort { actual: bytes.len() })?;

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&header[offset::SIGNATURE..offset::SIGNATURE + 4]);

        Ok(Self {
            version: header[offset::VERSION],
            operation: Operation::from(header[offset::OPERATION]),
            source: mac_from_slice(&header[offset::SOURCE..offset::SOURCE + 6]),
            destination: mac_from_slice(&header[offset::DESTINATION..offset::DESTINATION + 6]),
            sequence: u16::from_be_bytes([header[offset::SEQUENCE], header[offset::SEQUENCE + 1]]),
            signature,
        })
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == SIGNATURE
    }

    pub fn is_supported_version(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

/// Record header preceding every record value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: u16,
    /// Length of the value that follows, in bytes
    pub length: u16,
}

impl RecordHeader {
    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let t = self.record_type.to_be_bytes();
        let l = self.length.to_be_bytes();
        [t[0], t[1], l[0], l[1]]
    }

    /// Decode from the front of `bytes`, `None` if fewer than four bytes remain
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let b = bytes.get(..RECORD_HEADER_LEN)?;
        Some(Self {
            record_type: u16::from_be_bytes([b[0], b[1]]),
            length: u16::from_be_bytes([b[2], b[3]]),
        })
    }
}

/// Six raw octets of a hardware address
pub fn mac_octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}

/// Build a hardware address from exactly six bytes
pub(crate) fn mac_from_slice(b: &[u8]) -> MacAddr {
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}
