//! Configuration loading

use anyhow::{Context, Result};
use nsdp_core::wire::{CLIENT_PORT, DEVICE_PORT, MAX_DATAGRAM_LEN};
use nsdp_core::MacAddr;
use nsdp_discovery::DiscoveryOptions;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Interface used when none is given on the command line
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// How long to collect replies, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Local port replies arrive on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Port switches listen on
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: Ipv4Addr,
    /// Largest datagram accepted, in bytes
    #[serde(default = "default_receive_buffer")]
    pub receive_buffer: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            listen_port: default_listen_port(),
            device_port: default_device_port(),
            broadcast_address: default_broadcast_address(),
            receive_buffer: default_receive_buffer(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_listen_port() -> u16 {
    CLIENT_PORT
}

fn default_device_port() -> u16 {
    DEVICE_PORT
}

fn default_broadcast_address() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_receive_buffer() -> usize {
    MAX_DATAGRAM_LEN
}

impl Config {
    /// Build library options for a run on `interface`
    pub fn to_discovery_options(
        &self,
        interface: &str,
        destination: Option<MacAddr>,
    ) -> DiscoveryOptions {
        let mut options = DiscoveryOptions::new(interface);
        options.destination = destination;
        options.timeout = Duration::from_millis(self.discovery.timeout_ms);
        options.transport.listen_port = self.discovery.listen_port;
        options.transport.device_port = self.discovery.device_port;
        options.transport.broadcast_address = self.discovery.broadcast_address;
        options.transport.receive_buffer = self.discovery.receive_buffer;
        options
    }
}

/// Load configuration from file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nsdpc.toml")).unwrap();
        assert!(config.interface.is_none());
        assert_eq!(config.discovery.timeout_ms, 3000);
        assert_eq!(config.discovery.listen_port, 63321);
        assert_eq!(config.discovery.device_port, 63322);
        assert_eq!(config.discovery.broadcast_address, Ipv4Addr::BROADCAST);
        assert_eq!(config.discovery.receive_buffer, 2048);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
interface = "enp3s0"

[discovery]
timeout_ms = 500
broadcast_address = "192.168.0.255"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.interface.as_deref(), Some("enp3s0"));
        assert_eq!(config.discovery.timeout_ms, 500);
        assert_eq!(
            config.discovery.broadcast_address,
            Ipv4Addr::new(192, 168, 0, 255)
        );
        assert_eq!(config.discovery.listen_port, 63321);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[discovery]\ntimeout_ms = \"soon\"").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_to_discovery_options() {
        let mut config = Config::default();
        config.discovery.timeout_ms = 750;
        config.discovery.listen_port = 40000;
        let target = MacAddr::new(0x28, 0xc6, 0x8e, 0, 0, 1);

        let options = config.to_discovery_options("eth1", Some(target));
        assert_eq!(options.interface, "eth1");
        assert_eq!(options.destination, Some(target));
        assert_eq!(options.timeout, Duration::from_millis(750));
        assert_eq!(options.transport.interface.as_deref(), Some("eth1"));
        assert_eq!(options.transport.listen_port, 40000);
        assert_eq!(options.transport.device_port, 63322);
    }
}
