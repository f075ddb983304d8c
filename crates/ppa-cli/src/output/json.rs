//! JSON-formatted output for CLI.
//!
//! Streaming output is one compact object per line.

use std::net::SocketAddr;

use chrono::Local;
use ppa_core::protocol::hexdump;
use ppa_core::simulation::DeviceState;
use ppa_core::{PeerEvent, ReceivedMessage};
use serde::Serialize;
use serde_json::{json, Value};

use super::{unique_id_hex, OutputFormatter, PeerRow};

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_peer_event(&self, event: &PeerEvent) -> String {
        let mut value = serde_json::to_value(event).unwrap_or(json!({}));
        if let Value::Object(ref mut map) = value {
            map.insert("timestamp".to_string(), json!(Local::now().to_rfc3339()));
        }
        Self::to_json(&value)
    }

    fn format_received(&self, message: &ReceivedMessage, dump: bool) -> String {
        let mut value = json!({
            "timestamp": Local::now().to_rfc3339(),
            "from": message.remote,
            "client": message.client.name(),
            "interface": message.interface,
            "len": message.data.len(),
        });

        if let Value::Object(ref mut map) = value {
            if let Some(header) = &message.header {
                map.insert("type".to_string(), json!(header.message_type.to_string()));
                map.insert("status".to_string(), json!(header.status.to_string()));
                map.insert("sequence".to_string(), json!(header.sequence_number));
                map.insert("device_id".to_string(), json!(unique_id_hex(&header.device_unique_id)));
                map.insert("component_id".to_string(), json!(header.component_id));
            }
            if dump {
                map.insert("dump".to_string(), json!(hexdump(&message.data)));
            }
        }

        Self::to_json(&value)
    }

    fn format_peers(&self, peers: &[PeerRow]) -> String {
        Self::to_json(&json!({
            "peers": peers,
            "count": peers.len(),
            "online": peers.iter().filter(|p| p.online).count()
        }))
    }

    fn format_device_state(&self, address: SocketAddr, state: &DeviceState) -> String {
        Self::to_json(&json!({
            "address": address,
            "state": state
        }))
    }

    fn format_message(&self, message: &str) -> String {
        Self::to_json(&json!({ "message": message }))
    }
}
