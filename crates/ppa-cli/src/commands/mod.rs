//! Command implementations.

mod control;
pub mod discover;
pub mod ping;
pub mod recall;
pub mod simulate;
pub mod volume;

pub use discover::run_discover;
pub use ping::run_ping;
pub use recall::run_recall;
pub use simulate::run_simulate;
pub use volume::run_volume;

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use tokio_util::sync::CancellationToken;

use crate::error::{CliError, Result};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Session {
    /// Fires on Ctrl+C.
    pub cancel: CancellationToken,
    pub port: u16,
    pub component_id: u8,
    pub json: bool,
}

/// Resolve `host` or `host:port` to an IPv4 socket address, using `port`
/// when none is given.
pub(crate) fn resolve_address(address: &str, port: u16) -> Result<SocketAddr> {
    let address = address.trim();
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolved = if address.contains(':') {
        address.to_socket_addrs()
    } else {
        (address, port).to_socket_addrs()
    };

    resolved
        .map_err(|e| CliError::InvalidArgument(format!("cannot resolve '{}': {}", address, e)))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| CliError::InvalidArgument(format!("no IPv4 address for '{}'", address)))
}

/// Resolve a list of addresses, skipping empty entries.
pub(crate) fn resolve_addresses(addresses: &[String], port: u16) -> Result<Vec<SocketAddr>> {
    addresses
        .iter()
        .filter(|a| !a.trim().is_empty())
        .map(|a| resolve_address(a, port))
        .collect()
}
