//! One request/collect cycle against the switches on a link
//!
//! A [`DiscoveryExchange`] broadcasts a single read request and then gathers
//! replies until its time budget runs out. The budget covers the whole
//! collection phase, so a steady trickle of unrelated datagrams cannot keep
//! the exchange alive past its deadline.

use nsdp_core::{
    BuilderError, MacAddr, Operation, Packet, PacketBuilder, RecordType, Reply,
    SequenceGenerator, BROADCAST_MAC,
};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::transport::{Transport, TransportError};

/// Default time spent collecting replies
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Properties requested by a plain discovery
pub const DISCOVERY_RECORDS: [RecordType; 7] = [
    RecordType::Model,
    RecordType::Name,
    RecordType::MacAddress,
    RecordType::Ipv4,
    RecordType::Dhcp,
    RecordType::Firmware,
    RecordType::PortCount,
];

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to build request: {0}")]
    Builder(#[from] BuilderError),
    #[error("cannot {operation} while exchange is {state}")]
    InvalidState {
        operation: &'static str,
        state: ExchangeState,
    },
}

/// Externally visible phase of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    AwaitingSend,
    Collecting,
    Done,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeState::AwaitingSend => write!(f, "awaiting send"),
            ExchangeState::Collecting => write!(f, "collecting"),
            ExchangeState::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug)]
enum State {
    AwaitingSend,
    Collecting { sequence: u16, deadline: Instant },
    Done,
}

/// Broadcast read request plus reply collection over a [`Transport`]
pub struct DiscoveryExchange<T: Transport> {
    transport: T,
    source: MacAddr,
    destination: MacAddr,
    records: Vec<RecordType>,
    timeout: Duration,
    sequence: SequenceGenerator,
    state: State,
    replies: usize,
    discarded: usize,
}

impl<T: Transport> DiscoveryExchange<T> {
    /// Exchange requesting [`DISCOVERY_RECORDS`] from every switch on the link
    pub fn new(transport: T, source: MacAddr) -> Self {
        Self {
            transport,
            source,
            destination: BROADCAST_MAC,
            records: DISCOVERY_RECORDS.to_vec(),
            timeout: DISCOVERY_TIMEOUT,
            sequence: SequenceGenerator::new(),
            state: State::AwaitingSend,
            replies: 0,
            discarded: 0,
        }
    }

    /// Address a single switch instead of broadcasting to all of them
    pub fn with_destination(mut self, destination: MacAddr) -> Self {
        self.destination = destination;
        self
    }

    /// Properties to request. The tail marker is added on send.
    pub fn with_records(mut self, records: impl IntoIterator<Item = RecordType>) -> Self {
        self.records = records
            .into_iter()
            .map(RecordType::canonical)
            .filter(|r| *r != RecordType::Tail)
            .collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sequence_generator(mut self, sequence: SequenceGenerator) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn state(&self) -> ExchangeState {
        match self.state {
            State::AwaitingSend => ExchangeState::AwaitingSend,
            State::Collecting { .. } => ExchangeState::Collecting,
            State::Done => ExchangeState::Done,
        }
    }

    /// Datagrams received that could not be parsed as NSDP messages
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Build and broadcast the request, starting the collection deadline.
    ///
    /// Returns the request's sequence number. A send failure ends the
    /// exchange.
    pub async fn send(&mut self) -> Result<u16, ExchangeError> {
        if !matches!(self.state, State::AwaitingSend) {
            return Err(ExchangeError::InvalidState {
                operation: "send",
                state: self.state(),
            });
        }

        let mut packet = PacketBuilder::new_request(
            self.source,
            self.destination,
            Operation::ReadRequest,
            &mut self.sequence,
        );
        for record_type in &self.records {
            packet.request(*record_type)?;
        }
        packet.finalize()?;

        let sequence = packet.header().sequence;
        let bytes = packet.serialize();
        trace!(sequence = sequence, bytes = %hex::encode(&bytes), "Request datagram");

        if let Err(e) = self.transport.broadcast(&bytes).await {
            self.state = State::Done;
            return Err(e.into());
        }

        debug!(
            sequence = sequence,
            source = %self.source,
            destination = %self.destination,
            records = self.records.len(),
            "Sent discovery request"
        );

        self.state = State::Collecting {
            sequence,
            deadline: Instant::now() + self.timeout,
        };
        Ok(sequence)
    }

    /// Wait for the next reply within the remaining budget.
    ///
    /// Undecodable datagrams are logged and skipped. `Ok(None)` means the
    /// budget is spent and the exchange is done.
    pub async fn next_reply(&mut self) -> Result<Option<Reply>, ExchangeError> {
        let (sequence, deadline) = match self.state {
            State::Collecting { sequence, deadline } => (sequence, deadline),
            State::Done => return Ok(None),
            State::AwaitingSend => {
                return Err(ExchangeError::InvalidState {
                    operation: "receive",
                    state: self.state(),
                })
            }
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.finish();
                return Ok(None);
            }

            let datagram = match self.transport.receive(remaining).await {
                Ok(Some(datagram)) => datagram,
                Ok(None) => {
                    self.finish();
                    return Ok(None);
                }
                Err(e) => {
                    self.state = State::Done;
                    return Err(e.into());
                }
            };

            trace!(len = datagram.len(), bytes = %hex::encode(&datagram), "Reply datagram");

            let packet = match Packet::parse(datagram) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "Discarding undecodable datagram");
                    self.discarded += 1;
                    continue;
                }
            };

            let header = packet.header();
            if !header.has_valid_signature() || !header.is_supported_version() {
                warn!(
                    source = %header.source,
                    version = header.version,
                    signature = %hex::encode(header.signature),
                    "Reply carries an unexpected version or signature"
                );
            }
            if header.sequence != sequence {
                debug!(
                    expected = sequence,
                    received = header.sequence,
                    source = %header.source,
                    "Reply sequence does not match request"
                );
            }

            let reply = Reply::from_packet(&packet);
            for (record_type, error) in &reply.malformed {
                warn!(
                    source = %reply.header.source,
                    record = %record_type,
                    error = %error,
                    "Malformed record in reply"
                );
            }

            self.replies += 1;
            return Ok(Some(reply));
        }
    }

    /// Send the request if needed and gather every reply until the budget runs out
    pub async fn collect_replies(&mut self) -> Result<Vec<Reply>, ExchangeError> {
        if matches!(self.state, State::AwaitingSend) {
            self.send().await?;
        }

        let mut replies = Vec::new();
        while let Some(reply) = self.next_reply().await? {
            replies.push(reply);
        }
        Ok(replies)
    }

    fn finish(&mut self) {
        if let State::Collecting { sequence, .. } = self.state {
            info!(
                sequence = sequence,
                replies = self.replies,
                discarded = self.discarded,
                "Discovery finished"
            );
        }
        self.state = State::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use nsdp_core::MessageHeader;
    use std::collections::VecDeque;
    use std::io;

    enum Outcome {
        Datagram(Vec<u8>),
        Silence,
        Fail,
    }

    #[derive(Default)]
    struct ScriptedTransport {
        script: VecDeque<Outcome>,
        sent: Vec<Vec<u8>>,
        timeouts: Vec<Duration>,
        fail_send: bool,
    }

    impl ScriptedTransport {
        fn with(script: Vec<Outcome>) -> Self {
            Self {
                script: script.into(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            if self.fail_send {
                return Err(TransportError::Send(io::Error::new(
                    io::ErrorKind::NetworkUnreachable,
                    "network unreachable",
                )));
            }
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        async fn receive(&mut self, timeout: Duration) -> Result<Option<Bytes>, TransportError> {
            self.timeouts.push(timeout);
            match self.script.pop_front() {
                Some(Outcome::Datagram(d)) => Ok(Some(Bytes::from(d))),
                Some(Outcome::Silence) | None => Ok(None),
                Some(Outcome::Fail) => Err(TransportError::Receive(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "reset",
                ))),
            }
        }
    }

    fn local_mac() -> MacAddr {
        MacAddr::new(0x02, 0x00, 0x00, 0x00, 0x00, 0x01)
    }

    fn switch_mac(last: u8) -> MacAddr {
        MacAddr::new(0x28, 0xc6, 0x8e, 0x00, 0x00, last)
    }

    fn expected_sequence(seed: u64) -> u16 {
        SequenceGenerator::with_seed(seed).next_sequence()
    }

    fn reply(sequence: u16, from: MacAddr, records: &[(u16, &[u8])]) -> Vec<u8> {
        let mut buf = MessageHeader::new(Operation::ReadResponse, from, local_mac(), sequence)
            .encode()
            .to_vec();
        for (code, value) in records {
            buf.extend_from_slice(&code.to_be_bytes());
            buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
            buf.extend_from_slice(value);
        }
        buf.extend_from_slice(&[0xff, 0xff, 0x00, 0x00]);
        buf
    }

    fn exchange(transport: ScriptedTransport) -> DiscoveryExchange<ScriptedTransport> {
        DiscoveryExchange::new(transport, local_mac())
            .with_sequence_generator(SequenceGenerator::with_seed(5))
            .with_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_timeout_with_no_replies() {
        let mut exchange = exchange(ScriptedTransport::with(vec![Outcome::Silence]));
        assert_eq!(exchange.state(), ExchangeState::AwaitingSend);

        let replies = exchange.collect_replies().await.unwrap();
        assert!(replies.is_empty());
        assert_eq!(exchange.state(), ExchangeState::Done);

        let transport = exchange.into_transport();
        assert_eq!(transport.sent.len(), 1);
        // Header, seven requests, tail
        assert_eq!(transport.sent[0].len(), 32 + 7 * 4 + 4);
    }

    #[tokio::test]
    async fn test_request_layout() {
        let mut exchange = exchange(ScriptedTransport::default());
        let sequence = exchange.send().await.unwrap();
        assert_eq!(sequence, expected_sequence(5));

        let sent = &exchange.transport().sent[0];
        let packet = Packet::parse(sent.clone()).unwrap();
        assert_eq!(packet.header().operation, Operation::ReadRequest);
        assert_eq!(packet.header().source, local_mac());
        assert_eq!(packet.header().destination, BROADCAST_MAC);
        assert_eq!(packet.header().sequence, sequence);

        let requested: Vec<RecordType> = packet.records().map(|r| r.record_type).collect();
        assert_eq!(requested, DISCOVERY_RECORDS.to_vec());
        assert!(packet.records().all(|r| r.length == 0));
        assert_eq!(&sent[sent.len() - 4..], &[0xff, 0xff, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_two_replies_and_one_malformed() {
        let seq = expected_sequence(5);
        let mut exchange = exchange(ScriptedTransport::with(vec![
            Outcome::Datagram(reply(seq, switch_mac(1), &[(0x0003, b"SW01"), (0x6000, &[8])])),
            Outcome::Datagram(vec![0x01, 0x02, 0x00]),
            Outcome::Datagram(reply(seq, switch_mac(2), &[(0x0001, b"GS105E")])),
            Outcome::Silence,
        ]));

        let replies = exchange.collect_replies().await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].name().as_deref(), Some("SW01"));
        assert_eq!(replies[0].port_count(), Some(8));
        assert_eq!(replies[1].model().as_deref(), Some("GS105E"));
        assert_eq!(replies[1].header.source, switch_mac(2));
        assert_eq!(exchange.discarded(), 1);
        assert_eq!(exchange.state(), ExchangeState::Done);
    }

    #[tokio::test]
    async fn test_send_failure_is_fatal() {
        let transport = ScriptedTransport {
            fail_send: true,
            ..Default::default()
        };
        let mut exchange = exchange(transport);

        let err = exchange.collect_replies().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(TransportError::Send(_))));
        assert_eq!(exchange.state(), ExchangeState::Done);
        assert!(exchange.transport().timeouts.is_empty());
    }

    #[tokio::test]
    async fn test_next_reply_before_send() {
        let mut exchange = exchange(ScriptedTransport::default());
        let err = exchange.next_reply().await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidState {
                operation: "receive",
                state: ExchangeState::AwaitingSend
            }
        ));
    }

    #[tokio::test]
    async fn test_double_send_is_rejected() {
        let mut exchange = exchange(ScriptedTransport::default());
        exchange.send().await.unwrap();
        let err = exchange.send().await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidState {
                operation: "send",
                state: ExchangeState::Collecting
            }
        ));
        assert_eq!(exchange.transport().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_receive_error_ends_exchange() {
        let mut exchange = exchange(ScriptedTransport::with(vec![Outcome::Fail]));
        exchange.send().await.unwrap();

        let err = exchange.next_reply().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(TransportError::Receive(_))));
        assert_eq!(exchange.state(), ExchangeState::Done);
        assert!(exchange.next_reply().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_budget_never_waits() {
        let mut exchange = exchange(ScriptedTransport::with(vec![Outcome::Datagram(reply(
            expected_sequence(5),
            switch_mac(1),
            &[],
        ))]))
        .with_timeout(Duration::ZERO);

        let replies = exchange.collect_replies().await.unwrap();
        assert!(replies.is_empty());
        assert!(exchange.transport().timeouts.is_empty());
    }

    #[tokio::test]
    async fn test_receive_timeouts_stay_within_budget() {
        let seq = expected_sequence(5);
        let budget = Duration::from_millis(200);
        let mut exchange = exchange(ScriptedTransport::with(vec![
            Outcome::Datagram(reply(seq, switch_mac(1), &[])),
            Outcome::Datagram(reply(seq, switch_mac(2), &[])),
            Outcome::Datagram(reply(seq, switch_mac(3), &[])),
        ]))
        .with_timeout(budget);

        let replies = exchange.collect_replies().await.unwrap();
        assert_eq!(replies.len(), 3);

        let timeouts = &exchange.transport().timeouts;
        assert_eq!(timeouts.len(), 4);
        assert!(timeouts.iter().all(|t| *t <= budget));
        assert!(timeouts.windows(2).all(|w| w[1] <= w[0]));
    }

    #[tokio::test]
    async fn test_mismatched_sequence_is_still_yielded() {
        let seq = expected_sequence(5);
        let mut exchange = exchange(ScriptedTransport::with(vec![Outcome::Datagram(reply(
            seq.wrapping_add(1),
            switch_mac(9),
            &[(0x0003, b"stray")],
        ))]));

        let replies = exchange.collect_replies().await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].is_response_to(seq));
        assert_eq!(replies[0].name().as_deref(), Some("stray"));
    }

    #[tokio::test]
    async fn test_explicit_destination_and_records() {
        let target = switch_mac(4);
        let mut exchange = exchange(ScriptedTransport::default())
            .with_destination(target)
            .with_records([
                RecordType::Name,
                RecordType::Tail,
                RecordType::Unknown(0xffff),
                RecordType::Firmware,
            ]);
        exchange.send().await.unwrap();

        let packet = Packet::parse(exchange.transport().sent[0].clone()).unwrap();
        assert_eq!(packet.header().destination, target);
        let requested: Vec<RecordType> = packet.records().map(|r| r.record_type).collect();
        assert_eq!(requested, vec![RecordType::Name, RecordType::Firmware]);
    }
}
