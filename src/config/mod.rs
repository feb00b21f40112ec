pub mod types;

use std::path::{Path, PathBuf};

use crate::error::{Result, VigilError};
use types::VigilConfig;

/// Return XDG config dir (~/.config/vigil/)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("vigil")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load config from the given path (or the XDG default). A missing file
/// is not an error; it yields the defaults. An unreadable or invalid file
/// is the one systemic failure this tool has.
pub fn load_config(path: Option<&Path>) -> Result<VigilConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if !path.exists() {
        log::info!("no config at {}; using defaults", path.display());
        return Ok(VigilConfig::default());
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| VigilError::ConfigIo {
        path: path.clone(),
        source,
    })?;
    let mut config: VigilConfig =
        toml::from_str(&raw).map_err(|source| VigilError::ConfigParse {
            path: path.clone(),
            source,
        })?;

    for repo in &mut config.repositories {
        repo.path = expand_tilde(&repo.path);
    }

    validate(&config)?;
    log::info!(
        "loaded {} with {} repositories",
        path.display(),
        config.repositories.len()
    );
    Ok(config)
}

fn validate(config: &VigilConfig) -> Result<()> {
    if !(1..=3600).contains(&config.update_interval) {
        return Err(VigilError::Config(
            "update_interval must be between 1 and 3600 seconds".into(),
        ));
    }
    if !(1..=60).contains(&config.auth.fetch_timeout) {
        return Err(VigilError::Config(
            "auth.fetch_timeout must be between 1 and 60 seconds".into(),
        ));
    }
    if config.advanced.cache_duration > 60 {
        return Err(VigilError::Config(
            "advanced.cache_duration must be between 0 and 60 seconds".into(),
        ));
    }
    if !(1..=10).contains(&config.advanced.parallel_checks) {
        return Err(VigilError::Config(
            "advanced.parallel_checks must be between 1 and 10".into(),
        ));
    }
    for repo in &config.repositories {
        if repo.path.as_os_str().is_empty() {
            return Err(VigilError::Config("repository path must not be empty".into()));
        }
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}
