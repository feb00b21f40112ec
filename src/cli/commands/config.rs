use std::path::Path;

use vigil::config;

use crate::cli::OutputFormat;

/// Print the effective configuration after defaults and validation.
pub fn run(config_path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let config = config::load_config(config_path)?;

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), &config)?;
            println!();
        }
        OutputFormat::Human => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
