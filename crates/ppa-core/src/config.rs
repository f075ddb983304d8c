//! Protocol constants and runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default UDP port spoken by PPA devices
pub const DEFAULT_PORT: u16 = 5001;

/// Largest datagram read from a socket
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Capacity of a client's outbound frame queue
pub const SEND_QUEUE_CAPACITY: usize = 10;

/// Read timeout per receive-loop iteration, bounds cancellation latency
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Write timeout for a single datagram
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between broadcast pings and peer sweeps
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between interface scans
pub const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Silence after which a peer is reported lost
pub const PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Component id used by per-interface broadcast clients
pub const BROADCAST_COMPONENT_ID: u8 = 0xfe;

/// Component id used by directly addressed clients
pub const DEFAULT_COMPONENT_ID: u8 = 0xff;

/// Capacity of the shared received-message channel
pub const RECEIVED_QUEUE_CAPACITY: usize = 32;

/// Per-client socket settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub send_queue_capacity: usize,
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    #[serde(with = "millis")]
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: SEND_QUEUE_CAPACITY,
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

/// Settings for a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Port the devices listen on; pings go to 255.255.255.255:port
    pub port: u16,
    /// Interfaces discovery may use. Empty means every valid interface.
    pub allowed_interfaces: Vec<String>,
    #[serde(with = "millis")]
    pub scan_interval: Duration,
    #[serde(with = "millis")]
    pub ping_interval: Duration,
    #[serde(with = "millis")]
    pub peer_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_interfaces: Vec::new(),
            scan_interval: SCAN_INTERVAL,
            ping_interval: PING_INTERVAL,
            peer_timeout: PEER_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
