//! Preset recall command implementation.

use super::control::{run_targets, Action, Plan};
use super::Session;
use crate::cli::RecallArgs;
use crate::error::Result;

pub async fn run_recall(args: RecallArgs, session: &Session) -> Result<()> {
    let plan = Plan {
        action: Action::Recall(args.preset),
        repeat: args.repeat,
        dump: false,
    };
    run_targets(args.targets, plan, session).await
}
