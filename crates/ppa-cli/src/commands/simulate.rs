//! Simulate command implementation.

use ppa_core::simulation::{SimulatedDevice, SimulatorConfig};
use tracing::info;

use super::{resolve_address, Session};
use crate::cli::SimulateArgs;
use crate::error::Result;
use crate::output::{get_formatter, unique_id_hex};

/// Answer requests like a device until Ctrl+C, then print what it was told.
pub async fn run_simulate(args: SimulateArgs, session: &Session) -> Result<()> {
    let formatter = get_formatter(session.json);
    let address = resolve_address(&args.address, session.port)?;

    let config = SimulatorConfig {
        address,
        interface: args.interface,
        device_unique_id: args.unique_id,
        component_id: session.component_id,
        ..SimulatorConfig::default()
    };
    let device = SimulatedDevice::bind(config)?;
    let local = device.local_addr()?;

    info!(%local, id = %unique_id_hex(&args.unique_id), "simulating device");
    println!(
        "{}",
        formatter.format_message(&format!(
            "Simulating device {} on {} (press Ctrl+C to stop)",
            unique_id_hex(&args.unique_id),
            local
        ))
    );

    let result = device.run(session.cancel.clone()).await;
    println!("{}", formatter.format_device_state(local, &device.state()));
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_simulate_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let session = Session {
            cancel: cancel.clone(),
            port: 5001,
            component_id: 0xff,
            json: true,
        };
        let args = SimulateArgs {
            address: "127.0.0.1:0".to_string(),
            interface: None,
            unique_id: [0, 1, 2, 3],
        };

        let handle = tokio::spawn(async move { run_simulate(args, &session).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_simulate_rejects_bad_address() {
        let session = Session {
            cancel: CancellationToken::new(),
            port: 5001,
            component_id: 0xff,
            json: true,
        };
        let args = SimulateArgs {
            address: "300.1.2.3:x".to_string(),
            interface: None,
            unique_id: [0, 1, 2, 3],
        };
        assert!(run_simulate(args, &session).await.is_err());
    }
}
