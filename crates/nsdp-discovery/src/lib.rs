//! NSDP Discovery - Finding Netgear switches on a local link
//!
//! - UDP broadcast transport on the NSDP client and device ports
//! - Local interface hardware address lookup
//! - Request/collect exchange with a whole-run time budget
//! - One-shot `discover` entry points

pub mod discover;
pub mod exchange;
pub mod identity;
pub mod transport;

pub use discover::{discover, discover_with, DiscoveryError, DiscoveryOptions};
pub use exchange::{
    DiscoveryExchange, ExchangeError, ExchangeState, DISCOVERY_RECORDS, DISCOVERY_TIMEOUT,
};
pub use identity::{list_interfaces, IdentityError, LocalIdentity, SystemIdentity};
pub use transport::{Transport, TransportConfig, TransportError, UdpTransport};
