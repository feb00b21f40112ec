use std::path::Path;
use std::sync::Arc;

use vigil::config;
use vigil::core::git_ops::Git2Backend;
use vigil::core::monitor::Monitor;

use crate::cli::output;

/// One-shot check: a single cycle, a single status-bar JSON line.
pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config::load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            println!("{}", serde_json::to_string(&output::error_bar(&err.to_string()))?);
            return Err(err.into());
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    let (aggregated, statuses) = rt.block_on(async {
        let monitor = Monitor::new(config, Arc::new(Git2Backend));
        monitor.run_cycle().await
    });

    let bar = output::render_bar(&aggregated, statuses.len());
    println!("{}", serde_json::to_string(&bar)?);
    Ok(())
}
