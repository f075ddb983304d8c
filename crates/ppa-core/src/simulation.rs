//! Simulated PPA device.
//!
//! Answers every recognised request with a ping response and keeps track of
//! the recalled preset and master volume. Used by `ppa-cli simulate` and by
//! socket tests.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument, Level};

use crate::client::socket::bind_udp;
use crate::config::{ClientConfig, DEFAULT_COMPONENT_ID, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
use crate::error::Result;
use crate::protocol::{hexdump, Commands, Header, MessageType, Payload};
use crate::task::{join_group, send_or_cancel};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub address: SocketAddr,
    pub interface: Option<String>,
    pub device_unique_id: [u8; 4],
    pub component_id: u8,
    pub client: ClientConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            interface: None,
            device_unique_id: [0, 1, 2, 3],
            component_id: DEFAULT_COMPONENT_ID,
            client: ClientConfig::default(),
        }
    }
}

/// Observable state of the simulated device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub active_preset: Option<u8>,
    pub volume: f32,
    pub requests: u64,
}

pub struct SimulatedDevice {
    config: SimulatorConfig,
    socket: UdpSocket,
    state: Mutex<DeviceState>,
}

impl SimulatedDevice {
    /// Bind the device's socket. Must be called inside a tokio runtime.
    pub fn bind(config: SimulatorConfig) -> Result<Self> {
        let socket = UdpSocket::from_std(bind_udp(config.address, config.interface.as_deref())?)?;
        Ok(Self {
            config,
            socket,
            state: Mutex::new(DeviceState::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Apply a request and build the reply, if the message type is handled.
    pub fn handle(&self, data: &[u8]) -> Option<Bytes> {
        let (header, body) = match Header::split(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "ignoring datagram");
                return None;
            }
        };

        match header.message_type {
            MessageType::Ping | MessageType::LiveCmd | MessageType::PresetSave => {}
            MessageType::DeviceData | MessageType::PresetRecall => {
                match Payload::decode(&header, body) {
                    Ok(Payload::PresetRecall(recall)) => {
                        info!(preset = recall.index_position, "preset recalled");
                        self.state.lock().active_preset = Some(recall.index_position);
                    }
                    Ok(Payload::MasterVolume(volume)) => {
                        info!(volume = volume.volume(), "master volume set");
                        self.state.lock().volume = volume.volume();
                    }
                    Ok(_) => {}
                    Err(e) => warn!(message_type = %header.message_type, error = %e, "bad payload"),
                }
            }
            other => {
                debug!(message_type = %other, "unhandled message type");
                return None;
            }
        }

        self.state.lock().requests += 1;
        Some(Commands::response(
            &header,
            self.config.device_unique_id,
            self.config.component_id,
        ))
    }

    /// Serve requests until `cancel` fires or the socket fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let (send_tx, send_rx) = mpsc::channel(self.config.client.send_queue_capacity);
        let span = info_span!("simulator", local = ?self.socket.local_addr().ok());

        async {
            info!("simulated device listening");
            let group = cancel.child_token();
            join_group(
                &group,
                vec![
                    self.receive_loop(&group, send_tx).boxed(),
                    self.send_loop(&group, send_rx).boxed(),
                ],
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn receive_loop(
        &self,
        cancel: &CancellationToken,
        replies: mpsc::Sender<(Bytes, SocketAddr)>,
    ) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let read = timeout(self.config.client.read_timeout, self.socket.recv_from(&mut buf));
            let (len, from) = match read.await {
                Ok(Ok(v)) => v,
                Ok(Err(e)) => {
                    warn!(error = %e, "read failed");
                    return Err(e.into());
                }
                Err(_) => continue,
            };

            debug!(%from, len, "received packet");
            if tracing::enabled!(Level::TRACE) {
                trace!("\n{}", hexdump(&buf[..len]));
            }

            if let Some(reply) = self.handle(&buf[..len]) {
                if !send_or_cancel(cancel, &replies, (reply, from)).await {
                    return Ok(());
                }
            }
        }
    }

    async fn send_loop(
        &self,
        cancel: &CancellationToken,
        mut replies: mpsc::Receiver<(Bytes, SocketAddr)>,
    ) -> Result<()> {
        loop {
            let (frame, to) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                reply = replies.recv() => match reply {
                    Some(reply) => reply,
                    None => return Ok(()),
                },
            };

            // a failed reply is not fatal to the device
            match timeout(self.config.client.write_timeout, self.socket.send_to(&frame, to)).await {
                Ok(Ok(written)) => debug!(%to, written, "sent reply"),
                Ok(Err(e)) => warn!(%to, error = %e, "could not send reply"),
                Err(_) => warn!(%to, "reply timed out"),
            }
        }
    }
}
