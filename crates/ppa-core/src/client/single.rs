//! Client for a single destination address.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, warn, Instrument, Level};

use super::socket::bind_udp;
use super::{Client, Commander, ReceivedMessage};
use crate::config::{ClientConfig, MAX_DATAGRAM_SIZE};
use crate::error::{ClientError, Result};
use crate::protocol::{hexdump, Commands, Header};
use crate::task::{join_group, send_or_cancel};

/// UDP client for one device or one broadcast destination.
///
/// Cheap to clone; clones share the queue and the sequence counter.
#[derive(Clone)]
pub struct DeviceClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    destination: SocketAddr,
    interface: Option<String>,
    component_id: u8,
    config: ClientConfig,
    seq: AtomicU16,
    send_tx: mpsc::Sender<Bytes>,
    // taken by the first `run`
    send_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl DeviceClient {
    pub fn new(destination: SocketAddr, interface: Option<String>, component_id: u8) -> Self {
        Self::with_config(destination, interface, component_id, ClientConfig::default())
    }

    pub fn with_config(
        destination: SocketAddr,
        interface: Option<String>,
        component_id: u8,
        config: ClientConfig,
    ) -> Self {
        let (send_tx, send_rx) = mpsc::channel(config.send_queue_capacity);
        Self {
            inner: Arc::new(Inner {
                name: format!("SingleDevice-{}", destination),
                destination,
                interface,
                component_id,
                config,
                seq: AtomicU16::new(1),
                send_tx,
                send_rx: Mutex::new(Some(send_rx)),
            }),
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.inner.destination
    }

    pub fn interface(&self) -> Option<&str> {
        self.inner.interface.as_deref()
    }

    fn next_seq(&self) -> u16 {
        self.inner.seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn enqueue(&self, frame: Bytes) {
        if self.inner.send_tx.send(frame).await.is_err() {
            debug!(name = %self.inner.name, "client has exited, dropping frame");
        }
    }

    async fn send_loop(
        &self,
        cancel: &CancellationToken,
        socket: &UdpSocket,
        mut queue: mpsc::Receiver<Bytes>,
    ) -> Result<()> {
        let destination = self.inner.destination;

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                frame = queue.recv() => match frame {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
            };

            let write_timeout = self.inner.config.write_timeout;
            let write = timeout(write_timeout, socket.send_to(&frame, destination));
            match write.await {
                Ok(Ok(len)) => {
                    trace!(to = %destination, len, "sent");
                    if tracing::enabled!(Level::TRACE) {
                        trace!("\n{}", hexdump(&frame));
                    }
                }
                Ok(Err(e)) => {
                    warn!(to = %destination, error = %e, "write failed");
                    return Err(e.into());
                }
                Err(_) => {
                    warn!(to = %destination, "write timed out");
                    return Err(ClientError::WriteTimeout(destination.to_string()).into());
                }
            }
        }
    }

    async fn receive_loop(
        &self,
        cancel: &CancellationToken,
        socket: &UdpSocket,
        received: mpsc::Sender<ReceivedMessage>,
    ) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let read = timeout(self.inner.config.read_timeout, socket.recv_from(&mut buf));
            let (len, from) = match read.await {
                Ok(Ok(v)) => v,
                Ok(Err(e)) => {
                    warn!(error = %e, "read failed");
                    return Err(e.into());
                }
                // Timeout - loop to re-check cancellation
                Err(_) => continue,
            };

            let data = Bytes::copy_from_slice(&buf[..len]);
            trace!(%from, len, "received");
            if tracing::enabled!(Level::TRACE) {
                trace!("\n{}", hexdump(&data));
            }

            let header = match Header::parse(&data) {
                Ok(header) => Some(header),
                Err(e) => {
                    debug!(%from, error = %e, "unparseable header");
                    None
                }
            };

            let message = ReceivedMessage {
                header,
                data,
                remote: from,
                interface: self.inner.interface.clone(),
                client: Arc::new(self.clone()),
            };

            if !send_or_cancel(cancel, &received, message).await {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Commander for DeviceClient {
    async fn send_ping(&self) {
        let frame = Commands::ping(self.next_seq(), self.inner.component_id);
        self.enqueue(frame).await;
    }

    async fn send_preset_recall_by_index(&self, index: u8) {
        let frame =
            Commands::preset_recall_by_index(self.next_seq(), self.inner.component_id, index);
        self.enqueue(frame).await;
    }

    async fn send_master_volume(&self, volume: f32) {
        match Commands::master_volume(self.next_seq(), self.inner.component_id, volume) {
            Ok(frame) => self.enqueue(frame).await,
            Err(e) => warn!(name = %self.inner.name, error = %e, "dropping master volume command"),
        }
    }
}

#[async_trait]
impl Client for DeviceClient {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        received: mpsc::Sender<ReceivedMessage>,
    ) -> Result<()> {
        let queue = self
            .inner
            .send_rx
            .lock()
            .take()
            .ok_or_else(|| ClientError::AlreadyRunning(self.inner.name.clone()))?;

        let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::from_std(bind_udp(local, self.inner.interface.as_deref())?)?;

        let span = info_span!(
            "device_client",
            name = %self.inner.name,
            iface = self.inner.interface.as_deref().unwrap_or("-"),
        );

        async {
            debug!(local = ?socket.local_addr().ok(), "client started");

            let group = cancel.child_token();
            let result = join_group(
                &group,
                vec![
                    self.send_loop(&group, &socket, queue).boxed(),
                    self.receive_loop(&group, &socket, received).boxed(),
                ],
            )
            .await;

            debug!(ok = result.is_ok(), "client stopped");
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageType, Status};
    use std::time::Duration;

    fn loopback_peer() -> (std::net::UdpSocket, SocketAddr) {
        let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = peer.local_addr().unwrap();
        (peer, addr)
    }

    #[test]
    fn test_name_and_sequence() {
        let client = DeviceClient::new("10.0.0.5:5001".parse().unwrap(), None, 0xff);
        assert_eq!(client.name(), "SingleDevice-10.0.0.5:5001");
        assert_eq!(client.next_seq(), 1);
        assert_eq!(client.next_seq(), 2);
    }

    #[tokio::test]
    async fn test_sends_and_forwards_replies() {
        let (peer, addr) = loopback_peer();
        let peer = UdpSocket::from_std({
            peer.set_nonblocking(true).unwrap();
            peer
        })
        .unwrap();

        let client = DeviceClient::new(addr, None, 0xff);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        let runner = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.run(cancel, tx).await })
        };

        client.send_ping().await;

        let mut buf = [0u8; 64];
        let (len, from) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let request = Header::parse(&buf[..len]).unwrap();
        assert_eq!(request.message_type, MessageType::Ping);
        assert_eq!(request.sequence_number, 1);

        let reply = Commands::response(&request, [9, 9, 9, 9], 0);
        peer.send_to(&reply, from).await.unwrap();

        let message = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(message.remote, addr);
        let header = message.header.unwrap();
        assert_eq!(header.status, Status::ResponseServer);
        assert_eq!(header.sequence_number, 1);
        assert_eq!(message.client.name(), client.name());

        cancel.cancel();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_short_datagram_has_no_header() {
        let (peer, addr) = loopback_peer();
        let client = DeviceClient::new(addr, None, 0xff);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        let runner = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.run(cancel, tx).await })
        };

        // learn the client's ephemeral port from its first datagram
        client.send_ping().await;
        let mut buf = [0u8; 64];
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let (_, from) = tokio::task::spawn_blocking(move || {
            let r = peer.recv_from(&mut buf).unwrap();
            peer.send_to(&[1, 2, 3], r.1).unwrap();
            r
        })
        .await
        .unwrap();
        assert_ne!(from.port(), 0);

        let message = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert!(message.header.is_none());
        assert_eq!(&message.data[..], &[1, 2, 3]);
        assert!(message.payload().is_none());

        cancel.cancel();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_promptly_after_cancel() {
        let client = DeviceClient::new("127.0.0.1:9".parse().unwrap(), None, 0xff);
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);

        let runner = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.run(cancel, tx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = timeout(Duration::from_millis(500), runner).await;
        assert!(result.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_write_failure_ends_run() {
        // IPv4 socket cannot reach an IPv6 destination
        let client = DeviceClient::new("[::1]:5001".parse().unwrap(), None, 0xff);
        client.send_ping().await;

        let (tx, _rx) = mpsc::channel(1);
        let result = timeout(Duration::from_secs(2), client.run(CancellationToken::new(), tx))
            .await
            .unwrap();
        assert!(matches!(result, Err(crate::error::CoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_full_queue_blocks_sender() {
        let client = DeviceClient::new("127.0.0.1:9".parse().unwrap(), None, 0xff);
        for _ in 0..crate::config::SEND_QUEUE_CAPACITY {
            timeout(Duration::from_millis(100), client.send_ping())
                .await
                .unwrap();
        }

        let pending = timeout(Duration::from_millis(50), client.send_ping()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_second_run_rejected() {
        let client = DeviceClient::new("127.0.0.1:9".parse().unwrap(), None, 0xff);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, _rx) = mpsc::channel(1);
        client.run(cancel.clone(), tx.clone()).await.unwrap();

        let err = client.run(cancel, tx).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Client(ClientError::AlreadyRunning(_))
        ));
    }
}
