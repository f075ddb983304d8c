//! One broadcast client per active interface.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, Instrument};

use crate::client::{Client, DeviceClient, ReceivedMessage};
use crate::config::{ClientConfig, BROADCAST_COMPONENT_ID};
use crate::error::{ClientError, Result};

/// Builds the client that serves one interface.
pub trait ClientFactory: Send + Sync {
    fn create(&self, iface: &str) -> Result<Arc<dyn Client>>;
}

/// Broadcasts to `255.255.255.255:<port>` from a socket bound to the interface.
#[derive(Debug, Clone)]
pub struct BroadcastClientFactory {
    port: u16,
    config: ClientConfig,
}

impl BroadcastClientFactory {
    pub fn new(port: u16, config: ClientConfig) -> Self {
        Self { port, config }
    }
}

impl ClientFactory for BroadcastClientFactory {
    fn create(&self, iface: &str) -> Result<Arc<dyn Client>> {
        let destination = SocketAddr::from((Ipv4Addr::BROADCAST, self.port));
        Ok(Arc::new(DeviceClient::with_config(
            destination,
            Some(iface.to_string()),
            BROADCAST_COMPONENT_ID,
            self.config,
        )))
    }
}

struct Entry {
    client: Arc<dyn Client>,
    cancel: CancellationToken,
}

type Entries = Arc<RwLock<HashMap<String, Entry>>>;

/// Starts, stops and tracks the per-interface clients.
///
/// An entry lives from `start_interface_client` until its client task exits;
/// the task removes its own entry.
pub struct InterfaceManager {
    factory: Arc<dyn ClientFactory>,
    received: mpsc::Sender<ReceivedMessage>,
    entries: Entries,
    tracker: TaskTracker,
    waiting: AtomicBool,
}

impl InterfaceManager {
    pub fn new(factory: Arc<dyn ClientFactory>, received: mpsc::Sender<ReceivedMessage>) -> Self {
        Self {
            factory,
            received,
            entries: Arc::new(RwLock::new(HashMap::new())),
            tracker: TaskTracker::new(),
            waiting: AtomicBool::new(false),
        }
    }

    /// Start a client for `iface`, running under a child of `cancel`.
    pub fn start_interface_client(
        &self,
        cancel: &CancellationToken,
        iface: &str,
    ) -> Result<Arc<dyn Client>> {
        let (client, token) = {
            let mut entries = self.entries.write();
            if self.waiting.load(Ordering::SeqCst) {
                return Err(ClientError::Busy("shutdown".to_string()).into());
            }
            if entries.contains_key(iface) {
                return Err(ClientError::Exists(iface.to_string()).into());
            }

            let client = self.factory.create(iface)?;
            let token = cancel.child_token();
            entries.insert(
                iface.to_string(),
                Entry {
                    client: client.clone(),
                    cancel: token.clone(),
                },
            );
            (client, token)
        };

        info!(%iface, name = %client.name(), "starting interface client");

        let entries = self.entries.clone();
        let received = self.received.clone();
        let runner = client.clone();
        let iface_owned = iface.to_string();
        self.tracker.spawn(
            async move {
                let result = runner.run(token, received).await;
                entries.write().remove(&iface_owned);

                match result {
                    Ok(()) => info!("interface client stopped"),
                    Err(e) => error!(error = %e, "interface client failed"),
                }
            }
            .instrument(tracing::info_span!("interface", iface = %iface)),
        );

        Ok(client)
    }

    /// Ask the client for `iface` to stop. Its entry disappears once it has.
    pub fn cancel_interface_client(&self, iface: &str) -> Result<()> {
        let entries = self.entries.read();
        let entry = entries
            .get(iface)
            .ok_or_else(|| ClientError::NotFound(iface.to_string()))?;

        info!(%iface, "cancelling interface client");
        entry.cancel.cancel();
        Ok(())
    }

    /// Cancel every tracked client.
    pub fn cancel_all(&self) {
        for entry in self.entries.read().values() {
            entry.cancel.cancel();
        }
    }

    /// Ping through every client.
    pub async fn send_ping(&self) {
        let clients: Vec<Arc<dyn Client>> = self
            .entries
            .read()
            .values()
            .map(|e| e.client.clone())
            .collect();
        join_all(clients.iter().map(|c| c.send_ping())).await;
    }

    /// Names of the tracked interfaces, sorted. May include clients that are
    /// already cancelled but have not exited yet.
    pub fn client_interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Refuse further starts and wait for every client task to exit.
    pub async fn wait(&self) {
        {
            let _entries = self.entries.write();
            self.waiting.store(true, Ordering::SeqCst);
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}
