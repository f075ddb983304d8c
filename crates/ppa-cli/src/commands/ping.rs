//! Ping command implementation.

use super::control::{run_targets, Action, Plan};
use super::Session;
use crate::cli::PingArgs;
use crate::error::Result;

/// Ping the targets every 5 seconds and print whatever comes back.
pub async fn run_ping(args: PingArgs, session: &Session) -> Result<()> {
    let plan = Plan {
        action: Action::Ping,
        repeat: true,
        dump: args.dump,
    };
    run_targets(args.targets, plan, session).await
}
