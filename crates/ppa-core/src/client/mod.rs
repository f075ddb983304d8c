//! UDP clients that talk to PPA devices.
//!
//! A [`DeviceClient`] owns one socket aimed at one destination (a device or a
//! broadcast address). A [`MultiClient`] fans commands out to several clients
//! and runs them as one group.

pub mod multi;
pub mod single;
pub mod socket;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ProtocolError, Result};
use crate::protocol::{Header, Payload, HEADER_SIZE};

pub use multi::MultiClient;
pub use single::DeviceClient;

/// Commands every client can send. Frames are queued, never sent inline.
#[async_trait]
pub trait Commander: Send + Sync {
    async fn send_ping(&self);
    async fn send_preset_recall_by_index(&self, index: u8);
    /// `volume` in `0.0..=1.0`; out-of-range values are logged and dropped.
    async fn send_master_volume(&self, volume: f32);
}

#[async_trait]
pub trait Client: Commander {
    fn name(&self) -> String;

    /// Drive the client until `cancel` fires or a socket error occurs.
    ///
    /// Every datagram received is forwarded on `received`.
    async fn run(
        &self,
        cancel: CancellationToken,
        received: mpsc::Sender<ReceivedMessage>,
    ) -> Result<()>;
}

impl fmt::Debug for dyn Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("name", &self.name()).finish()
    }
}

/// A datagram received by a client.
#[derive(Clone)]
pub struct ReceivedMessage {
    /// `None` when the datagram was too short to hold a header
    pub header: Option<Header>,
    /// Complete datagram, header included
    pub data: Bytes,
    pub remote: SocketAddr,
    /// Interface the receiving socket is bound to, if any
    pub interface: Option<String>,
    /// Client that received the datagram, usable for replies
    pub client: Arc<dyn Client>,
}

impl ReceivedMessage {
    /// Decode the payload following the header.
    ///
    /// `None` when there is no header or `data` is shorter than one.
    pub fn payload(&self) -> Option<std::result::Result<Payload, ProtocolError>> {
        let header = self.header.as_ref()?;
        let body = self.data.get(HEADER_SIZE..)?;
        Some(Payload::decode(header, body))
    }
}

impl fmt::Debug for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedMessage")
            .field("header", &self.header)
            .field("len", &self.data.len())
            .field("remote", &self.remote)
            .field("interface", &self.interface)
            .field("client", &self.client.name())
            .finish()
    }
}
