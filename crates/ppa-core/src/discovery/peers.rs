//! Peer liveness tracking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Change in a peer's reachability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PeerEvent {
    Discovered {
        address: SocketAddr,
        interface: Option<String>,
    },
    Lost {
        address: SocketAddr,
        interface: Option<String>,
    },
}

impl PeerEvent {
    pub fn address(&self) -> SocketAddr {
        match self {
            PeerEvent::Discovered { address, .. } | PeerEvent::Lost { address, .. } => *address,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        match self {
            PeerEvent::Discovered { interface, .. } | PeerEvent::Lost { interface, .. } => {
                interface.as_deref()
            }
        }
    }
}

#[derive(Debug)]
struct Peer {
    interface: Option<String>,
    last_seen: Instant,
}

/// Last-seen times keyed by remote address.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<SocketAddr, Peer>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message from `address`. Returns `Discovered` the first time
    /// the address is seen (or seen again after being lost).
    pub fn observe(
        &mut self,
        address: SocketAddr,
        interface: Option<String>,
        now: Instant,
    ) -> Option<PeerEvent> {
        match self.peers.get_mut(&address) {
            Some(peer) => {
                peer.last_seen = now;
                peer.interface = interface;
                None
            }
            None => {
                self.peers.insert(
                    address,
                    Peer {
                        interface: interface.clone(),
                        last_seen: now,
                    },
                );
                Some(PeerEvent::Discovered { address, interface })
            }
        }
    }

    /// Drop peers silent for longer than `timeout`, returning a `Lost` for each.
    pub fn sweep(&mut self, now: Instant, timeout: Duration) -> Vec<PeerEvent> {
        let expired: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(_, peer)| now.saturating_duration_since(peer.last_seen) > timeout)
            .map(|(address, _)| *address)
            .collect();

        let mut lost = Vec::with_capacity(expired.len());
        for address in expired {
            if let Some(peer) = self.peers.remove(&address) {
                lost.push(PeerEvent::Lost {
                    address,
                    interface: peer.interface,
                });
            }
        }
        lost.sort_by_key(|e| e.address());
        lost
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
