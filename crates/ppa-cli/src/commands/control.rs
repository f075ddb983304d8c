//! Drives one action against fixed and discovered devices.
//!
//! Addresses given on the command line are grouped in a [`MultiClient`]
//! that lives for the whole command. With `--discover`, every peer found by
//! broadcast gets its own client, which is cancelled when the peer is lost.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use ppa_core::config::{PING_INTERVAL, RECEIVED_QUEUE_CAPACITY};
use ppa_core::task::join_group;
use ppa_core::{discover, Client, Commander, DeviceClient, MultiClient, PeerEvent, ReceivedMessage};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{resolve_addresses, Session};
use crate::cli::TargetArgs;
use crate::error::{CliError, Result};
use crate::output::{get_formatter, OutputFormatter};

/// Looping recalls cycle through this many presets.
const PRESET_CYCLE: u8 = 5;

/// Command sent to every device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Action {
    Ping,
    Recall(u8),
    Volume(f32),
}

impl Action {
    pub(crate) async fn apply(self, target: &dyn Commander) {
        match self {
            Action::Ping => target.send_ping().await,
            Action::Recall(index) => target.send_preset_recall_by_index(index).await,
            Action::Volume(volume) => target.send_master_volume(volume).await,
        }
    }

    /// Action for the next round.
    pub(crate) fn next(self) -> Self {
        match self {
            Action::Recall(index) => Action::Recall(index.wrapping_add(1) % PRESET_CYCLE),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Plan {
    pub action: Action,
    /// Send again every ping interval.
    pub repeat: bool,
    /// Hex dump received datagrams.
    pub dump: bool,
}

/// Send `plan` to the targets and print replies until Ctrl+C.
pub(crate) async fn run_targets(targets: TargetArgs, plan: Plan, session: &Session) -> Result<()> {
    let addresses = resolve_addresses(&targets.addresses, session.port)?;
    if addresses.is_empty() && !targets.discover {
        return Err(CliError::InvalidArgument(
            "no devices given, pass --addresses or --discover".to_string(),
        ));
    }

    let fixed = MultiClient::new();
    for address in &addresses {
        fixed.add_client(Arc::new(DeviceClient::new(*address, None, session.component_id)))?;
    }

    let (received_tx, received_rx) = mpsc::channel(RECEIVED_QUEUE_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(RECEIVED_QUEUE_CAPACITY);
    let group = session.cancel.child_token();
    let formatter = get_formatter(session.json);

    info!(
        action = ?plan.action,
        devices = addresses.len(),
        discover = targets.discover,
        "starting"
    );

    let controller = Controller {
        plan,
        fixed: &fixed,
        fixed_addresses: addresses.into_iter().collect(),
        peers: PeerClients::new(session.component_id, received_tx.clone()),
        formatter: formatter.as_ref(),
    };

    let mut tasks = vec![
        fixed.run(group.clone(), received_tx),
        controller.run(&group, received_rx, events_rx).boxed(),
    ];
    if targets.discover {
        tasks.push(discover(group.clone(), events_tx, targets.interfaces, session.port).boxed());
    } else {
        drop(events_tx);
    }

    join_group(&group, tasks).await?;
    Ok(())
}

struct Controller<'a> {
    plan: Plan,
    fixed: &'a MultiClient,
    fixed_addresses: HashSet<SocketAddr>,
    peers: PeerClients,
    formatter: &'a dyn OutputFormatter,
}

impl Controller<'_> {
    async fn run(
        mut self,
        cancel: &CancellationToken,
        mut received: mpsc::Receiver<ReceivedMessage>,
        mut events: mpsc::Receiver<PeerEvent>,
    ) -> ppa_core::Result<()> {
        let mut action = self.plan.action;
        action.apply(self.fixed).await;

        let mut ticker = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = ticker.tick(), if self.plan.repeat => {
                    action = action.next();
                    debug!(?action, "sending");
                    action.apply(self.fixed).await;
                    self.peers.apply(action).await;
                }

                Some(message) = received.recv() => {
                    println!("{}", self.formatter.format_received(&message, self.plan.dump));
                }

                Some(event) = events.recv() => {
                    println!("{}", self.formatter.format_peer_event(&event));
                    self.handle_peer_event(cancel, event, action).await;
                }
            }
        }

        self.peers.shutdown().await;
        Ok(())
    }

    async fn handle_peer_event(
        &mut self,
        cancel: &CancellationToken,
        event: PeerEvent,
        action: Action,
    ) {
        match event {
            PeerEvent::Discovered { address, interface } => {
                if self.fixed_addresses.contains(&address) {
                    debug!(%address, "peer already addressed directly");
                    return;
                }
                if let Some(client) = self.peers.add(cancel, address, interface) {
                    action.apply(&client).await;
                }
            }
            PeerEvent::Lost { address, .. } => {
                self.peers.remove(address);
            }
        }
    }
}

/// Clients for discovered peers, keyed by address.
struct PeerClients {
    component_id: u8,
    received: mpsc::Sender<ReceivedMessage>,
    clients: HashMap<SocketAddr, (DeviceClient, CancellationToken)>,
    tracker: TaskTracker,
}

impl PeerClients {
    fn new(component_id: u8, received: mpsc::Sender<ReceivedMessage>) -> Self {
        Self {
            component_id,
            received,
            clients: HashMap::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Start a client for `address`. Returns `None` if one is already running.
    fn add(
        &mut self,
        cancel: &CancellationToken,
        address: SocketAddr,
        interface: Option<String>,
    ) -> Option<DeviceClient> {
        if self.clients.contains_key(&address) {
            return None;
        }

        let client = DeviceClient::new(address, interface, self.component_id);
        let token = cancel.child_token();

        let runner = client.clone();
        let received = self.received.clone();
        let run_token = token.clone();
        self.tracker.spawn(async move {
            if let Err(e) = runner.run(run_token, received).await {
                warn!(%address, error = %e, "peer client failed");
            }
        });

        debug!(%address, "peer client started");
        self.clients.insert(address, (client.clone(), token));
        Some(client)
    }

    fn remove(&mut self, address: SocketAddr) -> bool {
        match self.clients.remove(&address) {
            Some((_, token)) => {
                debug!(%address, "peer client cancelled");
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn apply(&self, action: Action) {
        join_all(self.clients.values().map(|(client, _)| action.apply(client))).await;
    }

    async fn shutdown(mut self) {
        for (_, (_, token)) in self.clients.drain() {
            token.cancel();
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}
