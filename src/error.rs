use std::path::PathBuf;
use thiserror::Error;

/// Systemic failures that halt a cycle. Per-repository problems are not
/// errors at this level; they travel on `RepoStatus` instead.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot read config at {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, VigilError>;
