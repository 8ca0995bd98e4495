//! Local interface hardware address lookup

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use nsdp_core::MacAddr;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("failed to enumerate network interfaces: {0}")]
    Enumerate(#[from] network_interface::Error),
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error("interface {0} has no hardware address")]
    NoHardwareAddress(String),
    #[error("interface {interface} reports unparseable hardware address '{value}'")]
    InvalidHardwareAddress { interface: String, value: String },
}

/// Resolves the hardware address written into the header's source field
pub trait LocalIdentity {
    fn hardware_address(&self, interface: &str) -> Result<MacAddr, IdentityError>;
}

/// Looks interfaces up through the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl LocalIdentity for SystemIdentity {
    fn hardware_address(&self, interface: &str) -> Result<MacAddr, IdentityError> {
        let interfaces = NetworkInterface::show()?;
        let mut found = false;

        for iface in interfaces.into_iter().filter(|i| i.name == interface) {
            found = true;
            if let Some(raw) = iface.mac_addr {
                let mac = parse_hardware_address(interface, &raw)?;
                debug!(interface = interface, mac = %mac, "Resolved interface hardware address");
                return Ok(mac);
            }
        }

        if found {
            Err(IdentityError::NoHardwareAddress(interface.to_string()))
        } else {
            Err(IdentityError::InterfaceNotFound(interface.to_string()))
        }
    }
}

/// All local interfaces with their hardware address, sorted by name
pub fn list_interfaces() -> Result<Vec<(String, Option<MacAddr>)>, IdentityError> {
    let mut by_name: BTreeMap<String, Option<MacAddr>> = BTreeMap::new();

    for iface in NetworkInterface::show()? {
        let mac = iface
            .mac_addr
            .as_deref()
            .and_then(|raw| parse_hardware_address(&iface.name, raw).ok());
        let entry = by_name.entry(iface.name).or_insert(None);
        if entry.is_none() {
            *entry = mac;
        }
    }

    Ok(by_name.into_iter().collect())
}

/// Parse an OS-reported address; all-zero (loopback, tunnels) counts as absent
fn parse_hardware_address(interface: &str, raw: &str) -> Result<MacAddr, IdentityError> {
    let mac: MacAddr = raw
        .trim()
        .replace('-', ":")
        .parse()
        .map_err(|_| IdentityError::InvalidHardwareAddress {
            interface: interface.to_string(),
            value: raw.to_string(),
        })?;

    if mac == MacAddr::new(0, 0, 0, 0, 0, 0) {
        return Err(IdentityError::NoHardwareAddress(interface.to_string()));
    }
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hardware_address() {
        let mac = parse_hardware_address("eth0", "a4:2b:b0:01:02:03").unwrap();
        assert_eq!(mac, MacAddr::new(0xa4, 0x2b, 0xb0, 0x01, 0x02, 0x03));
    }

    #[test]
    fn test_parse_hardware_address_dash_separated() {
        let mac = parse_hardware_address("Ethernet", "A4-2B-B0-01-02-03").unwrap();
        assert_eq!(mac, MacAddr::new(0xa4, 0x2b, 0xb0, 0x01, 0x02, 0x03));
    }

    #[test]
    fn test_zero_address_is_absent() {
        assert!(matches!(
            parse_hardware_address("lo", "00:00:00:00:00:00"),
            Err(IdentityError::NoHardwareAddress(name)) if name == "lo"
        ));
    }

    #[test]
    fn test_garbage_address() {
        assert!(matches!(
            parse_hardware_address("eth0", "not-a-mac"),
            Err(IdentityError::InvalidHardwareAddress { .. })
        ));
    }

    #[test]
    fn test_missing_interface() {
        let err = SystemIdentity
            .hardware_address("nsdp-test-no-such-if0")
            .unwrap_err();
        assert!(matches!(err, IdentityError::InterfaceNotFound(_)));
    }
}
