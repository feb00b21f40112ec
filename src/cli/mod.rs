pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Keep an eye on your repos from the status bar.",
    version
)]
pub struct Cli {
    /// Config file (defaults to ~/.config/vigil/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the polling loop, one status-bar JSON line per cycle
    Monitor,
    /// Probe once and print a single status-bar JSON line
    Status,
    /// Probe once and list every repository for the dropdown
    List,
    /// Show the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Dispatch a CLI command.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Monitor) => commands::monitor::run(cli.config.as_deref()),
        Some(Commands::Status) => commands::status::run(cli.config.as_deref()),
        Some(Commands::List) => commands::list::run(cli.config.as_deref(), cli.format),
        Some(Commands::Config) => commands::config::run(cli.config.as_deref(), cli.format),
        None => {
            // No subcommand — print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
