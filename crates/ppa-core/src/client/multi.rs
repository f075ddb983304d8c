//! Fan-out over several clients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Client, Commander, ReceivedMessage};
use crate::error::{ClientError, Result};
use crate::task::join_group;

/// Runs a fixed set of clients as one unit.
///
/// Clients are added before `run`; commands go to every member.
#[derive(Default)]
pub struct MultiClient {
    clients: RwLock<Vec<Arc<dyn Client>>>,
    running: AtomicBool,
}

impl MultiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, client: Arc<dyn Client>) -> std::result::Result<(), ClientError> {
        let name = client.name();
        if self.running.load(Ordering::SeqCst) {
            return Err(ClientError::Busy(name));
        }

        let mut clients = self.clients.write();
        if clients.iter().any(|c| c.name() == name) {
            return Err(ClientError::Exists(name));
        }
        debug!(%name, "adding client");
        clients.push(client);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Client>> {
        self.clients.read().clone()
    }
}

#[async_trait]
impl Commander for MultiClient {
    async fn send_ping(&self) {
        let clients = self.snapshot();
        join_all(clients.iter().map(|c| c.send_ping())).await;
    }

    async fn send_preset_recall_by_index(&self, index: u8) {
        let clients = self.snapshot();
        join_all(clients.iter().map(|c| c.send_preset_recall_by_index(index))).await;
    }

    async fn send_master_volume(&self, volume: f32) {
        let clients = self.snapshot();
        join_all(clients.iter().map(|c| c.send_master_volume(volume))).await;
    }
}

#[async_trait]
impl Client for MultiClient {
    fn name(&self) -> String {
        let names: Vec<String> = self.clients.read().iter().map(|c| c.name()).collect();
        format!("multiclient-{}", names.join(","))
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        received: mpsc::Sender<ReceivedMessage>,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyRunning(self.name()).into());
        }

        let clients = self.snapshot();
        info!(name = %self.name(), count = clients.len(), "starting clients");

        let group = cancel.child_token();
        let tasks = clients
            .iter()
            .map(|c| c.run(group.clone(), received.clone()).boxed())
            .collect();

        join_group(&group, tasks).await
    }
}
