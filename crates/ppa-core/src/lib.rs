//! Core library for discovering and controlling PPA amplifiers over UDP.
//!
//! - [`protocol`]: header and payload codec, frame builders
//! - [`client`]: per-destination UDP clients and fan-out
//! - [`discovery`]: interface tracking, broadcast pings and peer liveness
//! - [`simulation`]: a device that answers the protocol, for tests and demos

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod simulation;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Client, Commander, DeviceClient, MultiClient, ReceivedMessage};
pub use config::{ClientConfig, DiscoveryConfig};
pub use discovery::{discover, Discovery, PeerEvent};
pub use error::{ClientError, CoreError, ProtocolError, Result};
pub use simulation::{SimulatedDevice, SimulatorConfig};
