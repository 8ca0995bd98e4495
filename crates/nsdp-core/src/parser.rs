//! Parsing of received NSDP messages
//!
//! The buffer comes straight off the network, so every length read from it
//! is checked against the bytes actually present before it is used.

use bytes::Bytes;
use std::iter::FusedIterator;
use thiserror::Error;

use crate::record::{self, DecodeError, RecordType, RecordValue};
use crate::wire::{MessageHeader, RecordHeader, MESSAGE_HEADER_LEN, RECORD_HEADER_LEN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("buffer of {actual} bytes is shorter than the 32-byte message header")]
    TooShort { actual: usize },
}

/// A received message: decoded header plus the raw buffer
#[derive(Debug, Clone)]
pub struct Packet {
    header: MessageHeader,
    data: Bytes,
}

impl Packet {
    /// Parse a received datagram.
    ///
    /// Fails only when the buffer cannot hold a header. Records are walked
    /// lazily by [`Packet::records`].
    pub fn parse(buffer: impl Into<Bytes>) -> Result<Self, ParseError> {
        let data = buffer.into();
        let header = MessageHeader::decode(&data)?;
        Ok(Self { header, data })
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Forward-only walk over the records following the header
    pub fn records(&self) -> Records<'_> {
        Records {
            data: &self.data,
            offset: MESSAGE_HEADER_LEN,
            done: false,
        }
    }
}

/// One record as found on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: RecordType,
    pub length: u16,
    pub value: Bytes,
}

impl Record {
    pub fn decode(&self) -> Result<RecordValue, DecodeError> {
        record::decode_bytes(self.record_type, self.value.clone())
    }
}

/// Iterator over the records of a [`Packet`].
///
/// Ends at the tail record, when fewer than a record header's worth of bytes
/// remain, or at the first record whose declared length overruns the buffer.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    data: &'a Bytes,
    offset: usize,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.done {
            return None;
        }

        let remaining = self.data.get(self.offset..).unwrap_or_default();
        let Some(header) = RecordHeader::decode(remaining) else {
            self.done = true;
            return None;
        };

        let record_type = RecordType::from(header.record_type);
        if record_type == RecordType::Tail {
            self.done = true;
            return None;
        }

        let start = self.offset + RECORD_HEADER_LEN;
        let end = start + usize::from(header.length);
        if end > self.data.len() {
            self.done = true;
            return None;
        }

        self.offset = end;
        Some(Record {
            record_type,
            length: header.length,
            value: self.data.slice(start..end),
        })
    }
}

impl FusedIterator for Records<'_> {}
