//! OS network interface enumeration.

use std::collections::BTreeMap;

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

use crate::error::{CoreError, Result};

/// Flags and addressing of one network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub up: bool,
    pub broadcast: bool,
    pub loopback: bool,
    pub has_ipv4: bool,
}

impl NetInterface {
    /// Usable for broadcast discovery: up, broadcast-capable, not loopback,
    /// with an IPv4 address.
    pub fn is_valid(&self) -> bool {
        self.up && self.broadcast && !self.loopback && self.has_ipv4
    }
}

/// Source of the current interface list.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<NetInterface>>;
}

/// Interfaces reported by the operating system via `getifaddrs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<NetInterface>> {
        let addrs = getifaddrs()
            .map_err(|e| CoreError::Interface(format!("getifaddrs failed: {}", e)))?;

        // one entry per address; merge them per interface name
        let mut by_name: BTreeMap<String, NetInterface> = BTreeMap::new();
        for ifaddr in addrs {
            let has_ipv4 = ifaddr
                .address
                .as_ref()
                .and_then(|a| a.as_sockaddr_in())
                .is_some();

            let entry = by_name
                .entry(ifaddr.interface_name.clone())
                .or_insert_with(|| NetInterface {
                    name: ifaddr.interface_name.clone(),
                    up: false,
                    broadcast: false,
                    loopback: false,
                    has_ipv4: false,
                });

            entry.up |= ifaddr.flags.contains(InterfaceFlags::IFF_UP);
            entry.broadcast |= ifaddr.flags.contains(InterfaceFlags::IFF_BROADCAST);
            entry.loopback |= ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK);
            entry.has_ipv4 |= has_ipv4;
        }

        Ok(by_name.into_values().collect())
    }
}
