use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::types::AuthConfig;

/// How long the `gh auth status` probe may take before we give up on it.
const GH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a remote round trip would authenticate, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    SshAgent,
    GhCli,
    None,
}

/// What the process environment can offer this cycle. Detected once per
/// polling cycle rather than per repository; the environment rarely
/// changes mid-cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthCapabilities {
    pub ssh_agent: bool,
    pub gh_cli: bool,
}

impl AuthCapabilities {
    pub async fn detect(cfg: &AuthConfig) -> Self {
        let ssh_agent = cfg.use_ssh_agent && ssh_agent_present();
        let gh_cli = cfg.use_gh_cli && gh_cli_authenticated().await;
        log::debug!("auth capabilities: ssh_agent={ssh_agent} gh_cli={gh_cli}");
        Self { ssh_agent, gh_cli }
    }
}

/// Pick the strategy for one repository's remote. `None` is not an error;
/// it skips upstream-freshness detection for that repository this cycle.
pub fn resolve(caps: &AuthCapabilities, remote_url: Option<&str>) -> AuthStrategy {
    let Some(url) = remote_url else {
        return AuthStrategy::None;
    };
    if url.starts_with("git@") || url.starts_with("ssh://") {
        if caps.ssh_agent {
            AuthStrategy::SshAgent
        } else {
            AuthStrategy::None
        }
    } else if url.starts_with("https://") || url.starts_with("http://") {
        if caps.gh_cli {
            AuthStrategy::GhCli
        } else {
            AuthStrategy::None
        }
    } else {
        AuthStrategy::None
    }
}

fn ssh_agent_present() -> bool {
    socket_usable(std::env::var_os("SSH_AUTH_SOCK").as_deref())
}

/// An agent counts only if the advertised socket actually exists.
fn socket_usable(sock: Option<&OsStr>) -> bool {
    match sock {
        Some(sock) if !sock.is_empty() => Path::new(sock).exists(),
        _ => false,
    }
}

async fn gh_cli_authenticated() -> bool {
    let probe = Command::new("gh")
        .args(["auth", "status"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(GH_PROBE_TIMEOUT, probe).await {
        Ok(Ok(status)) => status.success(),
        // gh missing, or its status probe hung
        Ok(Err(_)) | Err(_) => false,
    }
}
