//! Structured task groups.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Run `tasks` concurrently until all of them finish.
///
/// The first task to fail cancels `cancel` so its siblings wind down; that
/// first error is returned once every task has exited.
pub async fn join_group(
    cancel: &CancellationToken,
    tasks: Vec<BoxFuture<'_, Result<()>>>,
) -> Result<()> {
    let mut pending: FuturesUnordered<_> = tasks.into_iter().collect();
    let mut first_error = None;

    while let Some(result) = pending.next().await {
        if let Err(e) = result {
            if first_error.is_none() {
                cancel.cancel();
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Send `value`, giving up if `cancel` fires first.
///
/// Returns `false` when the value was not delivered, either because of
/// cancellation or because the receiver is gone.
pub async fn send_or_cancel<T>(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<T>,
    value: T,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        res = tx.send(value) => res.is_ok(),
    }
}
