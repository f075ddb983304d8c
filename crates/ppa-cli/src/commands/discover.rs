//! Discover command implementation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::Local;
use ppa_core::config::RECEIVED_QUEUE_CAPACITY;
use ppa_core::{discover, PeerEvent};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::info;

use super::Session;
use crate::cli::DiscoverArgs;
use crate::error::Result;
use crate::output::{get_formatter, PeerRow};

/// Print peer events until Ctrl+C or `--duration`, then a summary.
pub async fn run_discover(args: DiscoverArgs, session: &Session) -> Result<()> {
    let formatter = get_formatter(session.json);
    let cancel = session.cancel.child_token();
    let (events_tx, mut events_rx) = mpsc::channel(RECEIVED_QUEUE_CAPACITY);
    let mut peers = BTreeMap::new();

    info!(port = session.port, interfaces = ?args.interfaces, "watching for devices");

    let discovery = discover(cancel.clone(), events_tx, args.interfaces, session.port);
    tokio::pin!(discovery);

    // without a duration the deadline is never armed
    let deadline = Instant::now() + Duration::from_secs(args.duration.unwrap_or(0));
    let timed = args.duration.is_some();

    let result = loop {
        tokio::select! {
            result = &mut discovery => break result,

            _ = sleep_until(deadline), if timed && !cancel.is_cancelled() => {
                info!("duration elapsed, stopping");
                cancel.cancel();
            }

            Some(event) = events_rx.recv() => {
                println!("{}", formatter.format_peer_event(&event));
                record_event(&mut peers, &event);
            }
        }
    };

    while let Ok(event) = events_rx.try_recv() {
        println!("{}", formatter.format_peer_event(&event));
        record_event(&mut peers, &event);
    }

    let rows: Vec<PeerRow> = peers.into_values().collect();
    println!("{}", formatter.format_peers(&rows));

    result?;
    Ok(())
}

fn record_event(peers: &mut BTreeMap<SocketAddr, PeerRow>, event: &PeerEvent) {
    let row = PeerRow {
        address: event.address(),
        interface: event.interface().map(str::to_string),
        online: matches!(event, PeerEvent::Discovered { .. }),
        since: Local::now(),
    };
    peers.insert(row.address, row);
}
