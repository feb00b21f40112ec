use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

use vigil::config;
use vigil::core::git_ops::Git2Backend;
use vigil::core::monitor::{ControlEvent, Monitor};

use crate::cli::output;

/// Run the polling loop until the bar disconnects or we are told to stop.
/// SIGUSR1 forces a cache-dropping refresh cycle.
pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config::load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            // Systemic failure: one top-level error state, then bail.
            println!("{}", serde_json::to_string(&output::error_bar(&err.to_string()))?);
            return Err(err.into());
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let monitor = Monitor::new(config, Arc::new(Git2Backend));
        let (tx, rx) = mpsc::channel(8);

        let mut refresh = signal(SignalKind::user_defined1())?;
        let refresh_tx = tx.clone();
        tokio::spawn(async move {
            while refresh.recv().await.is_some() {
                if refresh_tx.send(ControlEvent::Refresh).await.is_err() {
                    break;
                }
            }
        });

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = terminate.recv() => {}
                _ = interrupt.recv() => {}
            }
            let _ = tx.send(ControlEvent::Shutdown).await;
        });

        log::info!("starting monitor loop");
        monitor
            .run(rx, |aggregated, statuses| {
                let bar = output::render_bar(aggregated, statuses.len());
                let line = serde_json::to_string(&bar).map_err(std::io::Error::other)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()
            })
            .await;
        log::info!("monitor loop stopped");

        Ok(())
    })
}
