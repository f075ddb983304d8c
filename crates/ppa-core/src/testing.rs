//! In-memory clients and interface sources for tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, Commander, ReceivedMessage};
use crate::discovery::{ClientFactory, InterfaceSource, NetInterface};
use crate::error::{CoreError, Result};
use crate::protocol::Header;

/// Client that records commands and exposes its received channel.
pub(crate) struct FakeClient {
    name: String,
    interface: Option<String>,
    fail: bool,
    pings: AtomicUsize,
    pub volumes: Mutex<Vec<f32>>,
    received: Mutex<Option<mpsc::Sender<ReceivedMessage>>>,
    stopped: AtomicBool,
}

impl FakeClient {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, None, false)
    }

    /// Run fails shortly after starting.
    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, None, true)
    }

    fn build(name: &str, interface: Option<String>, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            interface,
            fail,
            pings: AtomicUsize::new(0),
            volumes: Mutex::new(Vec::new()),
            received: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.received.lock().is_some() && !self.stopped()
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Deliver a datagram with `header` as if it came from `remote`.
    pub async fn inject(self: &Arc<Self>, remote: SocketAddr, header: Header) {
        self.deliver(remote, Some(header), Bytes::copy_from_slice(&header.encode()))
            .await;
    }

    pub async fn inject_raw(self: &Arc<Self>, remote: SocketAddr, data: &[u8]) {
        let header = Header::parse(data).ok();
        self.deliver(remote, header, Bytes::copy_from_slice(data)).await;
    }

    async fn deliver(self: &Arc<Self>, remote: SocketAddr, header: Option<Header>, data: Bytes) {
        let tx = self.received.lock().clone().expect("client is not running");
        let message = ReceivedMessage {
            header,
            data,
            remote,
            interface: self.interface.clone(),
            client: self.clone(),
        };
        tx.send(message).await.expect("receiver dropped");
    }
}

#[async_trait]
impl Commander for FakeClient {
    async fn send_ping(&self) {
        self.pings.fetch_add(1, Ordering::SeqCst);
    }

    async fn send_preset_recall_by_index(&self, _index: u8) {}

    async fn send_master_volume(&self, volume: f32) {
        self.volumes.lock().push(volume);
    }
}

#[async_trait]
impl Client for FakeClient {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        received: mpsc::Sender<ReceivedMessage>,
    ) -> Result<()> {
        *self.received.lock() = Some(received);

        let result = if self.fail {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(CoreError::Other(format!("{} failed", self.name)))
        } else {
            cancel.cancelled().await;
            Ok(())
        };

        self.stopped.store(true, Ordering::SeqCst);
        result
    }
}

/// Factory handing out [`FakeClient`]s, one per interface.
#[derive(Default)]
pub(crate) struct FakeFactory {
    created: Mutex<Vec<Arc<FakeClient>>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> Vec<Arc<FakeClient>> {
        self.created.lock().clone()
    }

    /// Poll until the client for `iface` is running.
    pub async fn wait_for_client(&self, iface: &str) -> Arc<FakeClient> {
        loop {
            let found = self
                .created
                .lock()
                .iter()
                .rev()
                .find(|c| c.interface.as_deref() == Some(iface) && c.is_running())
                .cloned();
            if let Some(client) = found {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl ClientFactory for FakeFactory {
    fn create(&self, iface: &str) -> Result<Arc<dyn Client>> {
        let client = FakeClient::build(&format!("fake-{}", iface), Some(iface.to_string()), false);
        self.created.lock().push(client.clone());
        Ok(client as Arc<dyn Client>)
    }
}

/// Interface list controlled by the test.
#[derive(Default)]
pub(crate) struct StaticInterfaces {
    interfaces: Mutex<Vec<NetInterface>>,
    fail_next: AtomicBool,
}

impl StaticInterfaces {
    pub fn new(names: &[&str]) -> Arc<Self> {
        let source = Arc::new(Self::default());
        source.set(names);
        source
    }

    /// Replace the list with valid interfaces named `names`.
    pub fn set(&self, names: &[&str]) {
        *self.interfaces.lock() = names
            .iter()
            .map(|n| NetInterface {
                name: n.to_string(),
                up: true,
                broadcast: true,
                loopback: false,
                has_ipv4: true,
            })
            .collect();
    }

    pub fn push_loopback(&self, name: &str) {
        self.interfaces.lock().push(NetInterface {
            name: name.to_string(),
            up: true,
            broadcast: false,
            loopback: true,
            has_ipv4: true,
        });
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Result<Vec<NetInterface>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Interface("scan failed".to_string()));
        }
        Ok(self.interfaces.lock().clone())
    }
}
