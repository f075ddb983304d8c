//! Periodic interface scan producing add/remove notifications.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::interfaces::InterfaceSource;
use super::manager::InterfaceManager;
use crate::error::Result;
use crate::task::send_or_cancel;

/// Result of comparing known interfaces against the current scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterfaceDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl InterfaceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare `known` against the currently `valid` interfaces.
///
/// `added` are valid interfaces that are not known yet, restricted to
/// `allowed` unless it is empty. `removed` are known interfaces that are no
/// longer valid. Both lists are sorted.
pub fn diff_interfaces(
    known: &BTreeSet<String>,
    valid: &BTreeSet<String>,
    allowed: &[String],
) -> InterfaceDiff {
    let added = valid
        .difference(known)
        .filter(|name| allowed.is_empty() || allowed.iter().any(|a| a == *name))
        .cloned()
        .collect();
    let removed = known.difference(valid).cloned().collect();

    InterfaceDiff { added, removed }
}

pub struct InterfaceDetector {
    source: Arc<dyn InterfaceSource>,
    allowed: Vec<String>,
    scan_interval: Duration,
}

impl InterfaceDetector {
    pub fn new(
        source: Arc<dyn InterfaceSource>,
        allowed: Vec<String>,
        scan_interval: Duration,
    ) -> Self {
        Self {
            source,
            allowed,
            scan_interval,
        }
    }

    /// Scan once against `known`.
    pub fn scan(&self, known: &BTreeSet<String>) -> Result<InterfaceDiff> {
        let valid: BTreeSet<String> = self
            .source
            .interfaces()?
            .into_iter()
            .filter(|i| i.is_valid())
            .map(|i| i.name)
            .collect();

        Ok(diff_interfaces(known, &valid, &self.allowed))
    }

    /// Scan now and then every `scan_interval`, emitting each change on its channel.
    ///
    /// A failed scan ends the detector with that error.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        manager: &InterfaceManager,
        added: mpsc::Sender<String>,
        removed: mpsc::Sender<String>,
    ) -> Result<()> {
        let mut ticker = interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let known: BTreeSet<String> = manager.client_interfaces().into_iter().collect();
            let diff = self.scan(&known)?;
            if diff.is_empty() {
                continue;
            }
            debug!(added = ?diff.added, removed = ?diff.removed, "interfaces changed");

            for iface in diff.added {
                info!(%iface, "interface added");
                if !send_or_cancel(cancel, &added, iface).await {
                    return Ok(());
                }
            }
            for iface in diff.removed {
                info!(%iface, "interface removed");
                if !send_or_cancel(cancel, &removed, iface).await {
                    return Ok(());
                }
            }
        }
    }
}
