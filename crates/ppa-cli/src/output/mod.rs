//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use std::net::SocketAddr;

use chrono::{DateTime, Local};
use ppa_core::simulation::DeviceState;
use ppa_core::{PeerEvent, ReceivedMessage};
use serde::Serialize;

/// Last known state of a peer, for the discover summary.
#[derive(Debug, Clone, Serialize)]
pub struct PeerRow {
    pub address: SocketAddr,
    pub interface: Option<String>,
    pub online: bool,
    pub since: DateTime<Local>,
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format a peer appearing or going silent
    fn format_peer_event(&self, event: &PeerEvent) -> String;

    /// Format a received datagram, optionally with a hex dump
    fn format_received(&self, message: &ReceivedMessage, dump: bool) -> String;

    /// Format the peers seen during a discovery run
    fn format_peers(&self, peers: &[PeerRow]) -> String;

    /// Format the final state of a simulated device
    fn format_device_state(&self, address: SocketAddr, state: &DeviceState) -> String;

    /// Format a generic message
    fn format_message(&self, message: &str) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}

/// Device id as 8 hex digits.
pub(crate) fn unique_id_hex(id: &[u8; 4]) -> String {
    id.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
pub(crate) fn sample_reply() -> ReceivedMessage {
    use ppa_core::protocol::{Commands, Header};
    use ppa_core::DeviceClient;
    use std::sync::Arc;

    let request = Header::parse(&Commands::ping(9, 0xff)).unwrap();
    let data = Commands::response(&request, [0xde, 0xad, 0xbe, 0xef], 1);
    ReceivedMessage {
        header: Some(Header::parse(&data).unwrap()),
        data,
        remote: "10.0.0.7:5001".parse().unwrap(),
        interface: Some("eth0".to_string()),
        client: Arc::new(DeviceClient::new("10.0.0.7:5001".parse().unwrap(), None, 0xff)),
    }
}
