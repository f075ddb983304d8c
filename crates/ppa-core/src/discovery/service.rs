//! Discovery orchestration.
//!
//! Runs the interface detector next to an event loop that owns the peer
//! table. Either failing stops both, and no interface client outlives the
//! run.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::detector::InterfaceDetector;
use super::interfaces::{InterfaceSource, SystemInterfaces};
use super::manager::{BroadcastClientFactory, ClientFactory, InterfaceManager};
use super::peers::{PeerEvent, PeerTable};
use crate::client::ReceivedMessage;
use crate::config::{ClientConfig, DiscoveryConfig, RECEIVED_QUEUE_CAPACITY};
use crate::error::Result;
use crate::task::{join_group, send_or_cancel};

/// Discover devices on every usable interface (or only `allowed_interfaces`)
/// until `cancel` fires. Peer changes are sent on `events`.
pub async fn discover(
    cancel: CancellationToken,
    events: mpsc::Sender<PeerEvent>,
    allowed_interfaces: Vec<String>,
    port: u16,
) -> Result<()> {
    let config = DiscoveryConfig {
        allowed_interfaces,
        ..DiscoveryConfig::with_port(port)
    };
    Discovery::new(config).run(cancel, events).await
}

/// Configurable discovery run.
pub struct Discovery {
    config: DiscoveryConfig,
    client_config: ClientConfig,
    source: Arc<dyn InterfaceSource>,
    factory: Option<Arc<dyn ClientFactory>>,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            client_config: ClientConfig::default(),
            source: Arc::new(SystemInterfaces),
            factory: None,
        }
    }

    pub fn with_client_config(mut self, client_config: ClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    pub fn with_interface_source(mut self, source: Arc<dyn InterfaceSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub async fn run(
        self,
        cancel: CancellationToken,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<()> {
        let Discovery {
            config,
            client_config,
            source,
            factory,
        } = self;

        let factory = factory
            .unwrap_or_else(|| Arc::new(BroadcastClientFactory::new(config.port, client_config)));
        let (received_tx, received_rx) = mpsc::channel(RECEIVED_QUEUE_CAPACITY);
        let manager = InterfaceManager::new(factory, received_tx);
        let detector =
            InterfaceDetector::new(source, config.allowed_interfaces.clone(), config.scan_interval);

        // rendezvous between detector and event loop
        let (added_tx, added_rx) = mpsc::channel(1);
        let (removed_tx, removed_rx) = mpsc::channel(1);

        let scope = cancel.child_token();
        let event_loop = EventLoop {
            config: &config,
            manager: &manager,
            peers: PeerTable::new(),
            events,
        };

        info!(port = config.port, allowed = ?config.allowed_interfaces, "discovery started");

        let result = join_group(
            &scope,
            vec![
                detector.run(&scope, &manager, added_tx, removed_tx).boxed(),
                event_loop.run(&scope, added_rx, removed_rx, received_rx).boxed(),
            ],
        )
        .instrument(info_span!("discovery", port = config.port))
        .await;

        scope.cancel();
        manager.wait().await;

        match &result {
            Ok(()) => info!("discovery stopped"),
            Err(e) => warn!(error = %e, "discovery failed"),
        }
        result
    }
}

struct EventLoop<'a> {
    config: &'a DiscoveryConfig,
    manager: &'a InterfaceManager,
    peers: PeerTable,
    events: mpsc::Sender<PeerEvent>,
}

impl EventLoop<'_> {
    async fn run(
        mut self,
        cancel: &CancellationToken,
        mut added: mpsc::Receiver<String>,
        mut removed: mpsc::Receiver<String>,
        mut received: mpsc::Receiver<ReceivedMessage>,
    ) -> Result<()> {
        let period = self.config.ping_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),

                _ = ticker.tick() => {
                    for event in self.peers.sweep(Instant::now(), self.config.peer_timeout) {
                        info!(address = %event.address(), "peer lost");
                        if !send_or_cancel(cancel, &self.events, event).await {
                            return Ok(());
                        }
                    }
                    self.manager.send_ping().await;
                }

                Some(iface) = added.recv() => {
                    match self.manager.start_interface_client(cancel, &iface) {
                        Ok(client) => client.send_ping().await,
                        Err(e) => warn!(%iface, error = %e, "failed to start interface client"),
                    }
                }

                Some(iface) = removed.recv() => {
                    if let Err(e) = self.manager.cancel_interface_client(&iface) {
                        warn!(%iface, error = %e, "failed to cancel interface client");
                    }
                }

                Some(message) = received.recv() => {
                    if message.header.is_none() {
                        debug!(
                            from = %message.remote,
                            len = message.data.len(),
                            "ignoring datagram without header"
                        );
                        continue;
                    }

                    let interface = message.interface.clone();
                    let seen = self.peers.observe(message.remote, interface, Instant::now());
                    if let Some(event) = seen {
                        info!(
                            address = %event.address(),
                            iface = ?event.interface(),
                            "peer discovered"
                        );
                        if !send_or_cancel(cancel, &self.events, event).await {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Header, MessageType, Status};
    use crate::testing::{FakeFactory, StaticInterfaces};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn reply_header() -> Header {
        Header::new(MessageType::Ping, Status::ResponseServer, [1, 2, 3, 4], 1, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_and_lose_peer() {
        let source = StaticInterfaces::new(&["eth0"]);
        let factory = FakeFactory::new();
        let config = DiscoveryConfig {
            allowed_interfaces: vec!["eth0".to_string()],
            ..DiscoveryConfig::default()
        };

        let cancel = CancellationToken::new();
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let discovery = Discovery::new(config)
            .with_interface_source(source)
            .with_client_factory(factory.clone());
        let handle = tokio::spawn(discovery.run(cancel.clone(), events_tx));

        let client = factory.wait_for_client("eth0").await;
        assert_eq!(client.pings(), 1);
        assert_eq!(factory.created().len(), 1);

        let peer: SocketAddr = "192.168.1.50:5001".parse().unwrap();
        client.inject(peer, reply_header()).await;

        let event = events_rx.recv().await.unwrap();
        assert_eq!(
            event,
            PeerEvent::Discovered {
                address: peer,
                interface: Some("eth0".to_string())
            }
        );

        let event = tokio::time::timeout(Duration::from_secs(40), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, PeerEvent::Lost { address: peer, interface: Some("eth0".to_string()) });

        // one client for the whole run, pinged on every sweep
        assert_eq!(factory.created().len(), 1);
        assert!(client.pings() >= 7);

        client.inject(peer, reply_header()).await;
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, PeerEvent::Discovered { .. }));

        cancel.cancel();
        handle.await.unwrap().unwrap();
        assert!(client.stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_headerless_message_ignored() {
        let source = StaticInterfaces::new(&["eth0"]);
        let factory = FakeFactory::new();

        let cancel = CancellationToken::new();
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let discovery = Discovery::new(DiscoveryConfig::default())
            .with_interface_source(source)
            .with_client_factory(factory.clone());
        let handle = tokio::spawn(discovery.run(cancel.clone(), events_tx));

        let client = factory.wait_for_client("eth0").await;
        client.inject_raw("10.0.0.9:5001".parse().unwrap(), &[0xff, 0x00]).await;

        let result = tokio::time::timeout(Duration::from_secs(1), events_rx.recv()).await;
        assert!(result.is_err());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interface_removal_stops_client() {
        let source = StaticInterfaces::new(&["eth0", "eth1"]);
        let factory = FakeFactory::new();

        let cancel = CancellationToken::new();
        let (events_tx, _events_rx) = mpsc::channel(8);
        let discovery = Discovery::new(DiscoveryConfig::default())
            .with_interface_source(source.clone())
            .with_client_factory(factory.clone());
        let handle = tokio::spawn(discovery.run(cancel.clone(), events_tx));

        let eth1 = factory.wait_for_client("eth1").await;
        source.set(&["eth0"]);

        tokio::time::timeout(Duration::from_secs(10), async {
            while !eth1.stopped() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_error_stops_clients() {
        let source = StaticInterfaces::new(&["eth0"]);
        let factory = FakeFactory::new();

        let (events_tx, _events_rx) = mpsc::channel(8);
        let discovery = Discovery::new(DiscoveryConfig::default())
            .with_interface_source(source.clone())
            .with_client_factory(factory.clone());
        let handle = tokio::spawn(discovery.run(CancellationToken::new(), events_tx));

        let eth0 = factory.wait_for_client("eth0").await;
        source.fail_next();

        let result = tokio::time::timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
        assert!(result.is_err());
        assert!(eth0.stopped());
    }
}
