//! Master volume command implementation.

use ppa_core::protocol::MasterVolume;

use super::control::{run_targets, Action, Plan};
use super::Session;
use crate::cli::VolumeArgs;
use crate::error::{CliError, Result};

pub async fn run_volume(args: VolumeArgs, session: &Session) -> Result<()> {
    // reject before any socket is opened
    MasterVolume::from_volume(args.volume).map_err(|_| {
        CliError::InvalidArgument(format!("volume {} is outside 0.0..=1.0", args.volume))
    })?;

    let plan = Plan {
        action: Action::Volume(args.volume),
        repeat: args.repeat,
        dump: false,
    };
    run_targets(args.targets, plan, session).await
}
