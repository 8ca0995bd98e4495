//! One-shot discovery entry points

use nsdp_core::{MacAddr, RecordType, Reply, BROADCAST_MAC};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::exchange::{DiscoveryExchange, ExchangeError, DISCOVERY_RECORDS, DISCOVERY_TIMEOUT};
use crate::identity::{IdentityError, LocalIdentity, SystemIdentity};
use crate::transport::{TransportConfig, TransportError, UdpTransport};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Parameters of a discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Interface whose hardware address goes into the request
    pub interface: String,
    /// Switch to address, broadcast when unset
    pub destination: Option<MacAddr>,
    pub records: Vec<RecordType>,
    pub timeout: Duration,
    pub transport: TransportConfig,
}

impl DiscoveryOptions {
    pub fn new(interface: impl Into<String>) -> Self {
        let interface = interface.into();
        Self {
            transport: TransportConfig {
                interface: Some(interface.clone()),
                ..TransportConfig::default()
            },
            interface,
            destination: None,
            records: DISCOVERY_RECORDS.to_vec(),
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

/// Run a discovery with a caller-supplied identity source
pub async fn discover_with<I: LocalIdentity>(
    identity: &I,
    options: &DiscoveryOptions,
) -> Result<Vec<Reply>, DiscoveryError> {
    let source = identity.hardware_address(&options.interface)?;
    let transport = UdpTransport::bind(&options.transport)?;

    info!(
        interface = %options.interface,
        source = %source,
        timeout_ms = options.timeout.as_millis() as u64,
        "Starting NSDP discovery"
    );

    let mut exchange = DiscoveryExchange::new(transport, source)
        .with_destination(options.destination.unwrap_or(BROADCAST_MAC))
        .with_records(options.records.iter().copied())
        .with_timeout(options.timeout);

    Ok(exchange.collect_replies().await?)
}

/// Discover switches reachable through `interface`
pub async fn discover(
    interface: &str,
    destination: Option<MacAddr>,
) -> Result<Vec<Reply>, DiscoveryError> {
    let mut options = DiscoveryOptions::new(interface);
    options.destination = destination;
    discover_with(&SystemIdentity, &options).await
}
