//! LAN discovery of PPA devices.
//!
//! Watches the host's network interfaces, keeps one broadcast client per
//! usable interface, pings periodically and reports peers as they appear and
//! go silent.

pub mod detector;
pub mod interfaces;
pub mod manager;
pub mod peers;
pub mod service;

pub use detector::{diff_interfaces, InterfaceDetector, InterfaceDiff};
pub use interfaces::{InterfaceSource, NetInterface, SystemInterfaces};
pub use manager::{BroadcastClientFactory, ClientFactory, InterfaceManager};
pub use peers::{PeerEvent, PeerTable};
pub use service::{discover, Discovery};
