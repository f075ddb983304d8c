//! Human-readable output for CLI.

use std::net::SocketAddr;

use chrono::Local;
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use ppa_core::protocol::hexdump;
use ppa_core::simulation::DeviceState;
use ppa_core::{PeerEvent, ReceivedMessage};

use super::{unique_id_hex, OutputFormatter, PeerRow};

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_peer_event(&self, event: &PeerEvent) -> String {
        let iface = event.interface().unwrap_or("-");
        match event {
            PeerEvent::Discovered { address, .. } => {
                format!("{} {} {} via {}", Self::timestamp(), "[+]".green(), address, iface)
            }
            PeerEvent::Lost { address, .. } => {
                format!("{} {} {} via {}", Self::timestamp(), "[-]".red(), address, iface)
            }
        }
    }

    fn format_received(&self, message: &ReceivedMessage, dump: bool) -> String {
        let mut line = match &message.header {
            Some(header) => format!(
                "{} {} {}/{} seq={} id={} ({})",
                Self::timestamp(),
                message.remote.to_string().bold(),
                header.message_type,
                header.status,
                header.sequence_number,
                unique_id_hex(&header.device_unique_id),
                message.client.name().dimmed(),
            ),
            None => format!(
                "{} {} {} bytes without header ({})",
                Self::timestamp(),
                message.remote.to_string().bold(),
                message.data.len(),
                message.client.name().dimmed(),
            ),
        };

        if dump {
            line.push('\n');
            line.push_str(hexdump(&message.data).trim_end());
        }
        line
    }

    fn format_peers(&self, peers: &[PeerRow]) -> String {
        if peers.is_empty() {
            return "No devices found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Address", "Interface", "Status", "Since"]);

        for peer in peers {
            let status = if peer.online {
                Cell::new("online").fg(Color::Green)
            } else {
                Cell::new("lost").fg(Color::Red)
            };
            table.add_row(vec![
                Cell::new(peer.address),
                Cell::new(peer.interface.as_deref().unwrap_or("-")),
                status,
                Cell::new(peer.since.format("%H:%M:%S")),
            ]);
        }

        let online = peers.iter().filter(|p| p.online).count();
        format!("{}\n\nFound {} device(s), {} online", table, peers.len(), online)
    }

    fn format_device_state(&self, address: SocketAddr, state: &DeviceState) -> String {
        let preset = state
            .active_preset
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        let mut lines = Vec::new();
        lines.push(format!("Simulated device on {}", address));
        lines.push(format!("  Active preset: {}", preset));
        lines.push(format!("  Volume:        {:.3}", state.volume));
        lines.push(format!("  Requests:      {}", state.requests));
        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}
