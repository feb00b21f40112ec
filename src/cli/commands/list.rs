use std::path::Path;
use std::sync::Arc;

use vigil::config;
use vigil::core::git_ops::Git2Backend;
use vigil::core::monitor::Monitor;

use crate::cli::OutputFormat;
use crate::cli::output;

/// Probe once and print every repository for the dropdown launcher.
pub fn run(config_path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let config = config::load_config(config_path)?;
    let dropdown = config.dropdown.clone();

    let rt = tokio::runtime::Runtime::new()?;
    let (_aggregated, statuses) = rt.block_on(async {
        let monitor = Monitor::new(config, Arc::new(Git2Backend));
        monitor.run_cycle().await
    });

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), &statuses)?;
            println!();
        }
        OutputFormat::Human => {
            for line in output::render_dropdown(&statuses, &dropdown) {
                println!("{line}");
            }
        }
    }

    Ok(())
}
