//! Assembly of outgoing NSDP messages

use bytes::{BufMut, Bytes, BytesMut};
use pnet::util::MacAddr;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::record::{RecordType, RecordValue};
use crate::wire::{MessageHeader, Operation, RecordHeader, MESSAGE_HEADER_LEN, RECORD_HEADER_LEN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("packet already finalized, no more records can be appended")]
    AlreadyFinalized,
    #[error("{record_type} value of {length} bytes does not fit a record")]
    ValueTooLong { record_type: RecordType, length: usize },
}

/// Source of per-message sequence numbers
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    rng: StdRng,
}

impl SequenceGenerator {
    /// Generator seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator, the same seed always yields the same sequence
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_sequence(&mut self) -> u16 {
        self.rng.random()
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outgoing message under construction
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    header: MessageHeader,
    body: BytesMut,
    finalized: bool,
}

impl PacketBuilder {
    /// Start a message with the given header and no records
    pub fn new(header: MessageHeader) -> Self {
        Self {
            header,
            body: BytesMut::with_capacity(64),
            finalized: false,
        }
    }

    /// Start a request with a fresh sequence number
    pub fn new_request(
        source: MacAddr,
        destination: MacAddr,
        operation: Operation,
        sequence: &mut SequenceGenerator,
    ) -> Self {
        Self::new(MessageHeader::new(
            operation,
            source,
            destination,
            sequence.next_sequence(),
        ))
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Total serialized length so far
    pub fn len(&self) -> usize {
        MESSAGE_HEADER_LEN + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Append a record carrying `value` verbatim.
    ///
    /// Appending the tail type, under any spelling of its code, finalizes
    /// the packet and drops `value`.
    pub fn append_record(
        &mut self,
        record_type: RecordType,
        value: &[u8],
    ) -> Result<&mut Self, BuilderError> {
        let record_type = record_type.canonical();
        if record_type == RecordType::Tail {
            self.finalize()?;
            return Ok(self);
        }
        if self.finalized {
            return Err(BuilderError::AlreadyFinalized);
        }
        let length = u16::try_from(value.len()).map_err(|_| BuilderError::ValueTooLong {
            record_type,
            length: value.len(),
        })?;

        self.put_record(record_type, length, value);
        Ok(self)
    }

    /// Append a typed value, encoded with its canonical representation
    pub fn append_value(
        &mut self,
        record_type: RecordType,
        value: &RecordValue,
    ) -> Result<&mut Self, BuilderError> {
        self.append_record(record_type, &value.encode())
    }

    /// Append an empty record, asking the device for that property
    pub fn request(&mut self, record_type: RecordType) -> Result<&mut Self, BuilderError> {
        self.append_record(record_type, &[])
    }

    /// Terminate the record list with the tail record
    pub fn finalize(&mut self) -> Result<(), BuilderError> {
        if self.finalized {
            return Err(BuilderError::AlreadyFinalized);
        }
        self.put_record(RecordType::Tail, 0, &[]);
        self.finalized = true;
        Ok(())
    }

    /// Exact wire bytes: header followed by records in insertion order
    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.len());
        out.put_slice(&self.header.encode());
        out.put_slice(&self.body);
        out.freeze()
    }

    fn put_record(&mut self, record_type: RecordType, length: u16, value: &[u8]) {
        let header = RecordHeader {
            record_type: record_type.code(),
            length,
        };
        self.body.reserve(RECORD_HEADER_LEN + value.len());
        self.body.put_slice(&header.encode());
        self.body.put_slice(value);
    }
}
