use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use git2::{BranchType, Cred, FetchOptions, RemoteCallbacks, Repository, StatusOptions};

use super::auth::AuthStrategy;
use super::probe::{GitBackend, LocalStatus, UpstreamPosition};
use super::status::ProbeError;

/// The production `GitBackend`, built on libgit2. Strictly observational:
/// the only write it ever performs is a fetch's update of remote-tracking
/// refs.
pub struct Git2Backend;

fn open(path: &Path) -> Result<Repository, ProbeError> {
    Repository::open(path).map_err(|e| {
        log::debug!("cannot open {} as a repository: {e}", path.display());
        ProbeError::NotARepository
    })
}

impl GitBackend for Git2Backend {
    fn local_status(&self, path: &Path) -> Result<LocalStatus, ProbeError> {
        let repo = open(path)?;
        if repo.is_bare() {
            return Ok(LocalStatus::default());
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let statuses = repo.statuses(Some(&mut opts)).map_err(|e| {
            log::debug!("cannot read statuses for {}: {e}", path.display());
            ProbeError::NotARepository
        })?;

        let mut modified = 0u32;
        let mut untracked = 0u32;
        for entry in statuses.iter() {
            let s = entry.status();

            if s.intersects(
                git2::Status::INDEX_NEW
                    | git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE,
            ) {
                modified += 1;
            }

            if s.contains(git2::Status::WT_NEW) {
                untracked += 1;
            }
        }

        Ok(LocalStatus { modified, untracked })
    }

    fn upstream_position(&self, path: &Path) -> Result<UpstreamPosition, ProbeError> {
        let repo = open(path)?;

        // Unborn or detached HEAD behaves like no upstream.
        let Ok(head) = repo.head() else {
            return Ok(UpstreamPosition::default());
        };
        if !head.is_branch() {
            return Ok(UpstreamPosition::default());
        }
        let Some(local_oid) = head.target() else {
            return Ok(UpstreamPosition::default());
        };

        let Ok(branch) = repo.find_branch(head.shorthand().unwrap_or(""), BranchType::Local)
        else {
            return Ok(UpstreamPosition::default());
        };
        let Ok(upstream) = branch.upstream() else {
            return Ok(UpstreamPosition::default());
        };
        let Some(upstream_oid) = upstream.get().target() else {
            return Ok(UpstreamPosition::default());
        };

        let (ahead, behind) = repo
            .graph_ahead_behind(local_oid, upstream_oid)
            .unwrap_or((0, 0));

        Ok(UpstreamPosition {
            has_upstream: true,
            ahead: ahead as u32,
            behind: behind as u32,
        })
    }

    fn remote_url(&self, path: &Path) -> Result<Option<String>, ProbeError> {
        let repo = open(path)?;
        Ok(upstream_remote_name(&repo)
            .and_then(|name| repo.find_remote(&name).ok())
            .and_then(|remote| remote.url().map(String::from)))
    }

    fn fetch_remote(
        &self,
        path: &Path,
        strategy: AuthStrategy,
        cancel: &AtomicBool,
    ) -> Result<(), String> {
        let repo = open(path).map_err(|kind| kind.label().to_string())?;
        let remote_name = upstream_remote_name(&repo).unwrap_or_else(|| "origin".to_string());
        let mut remote = repo.find_remote(&remote_name).map_err(|e| e.to_string())?;

        let mut callbacks = RemoteCallbacks::new();
        match strategy {
            AuthStrategy::SshAgent => {
                callbacks.credentials(|_url, username, _allowed| {
                    Cred::ssh_key_from_agent(username.unwrap_or("git"))
                });
            }
            AuthStrategy::GhCli => {
                // gh registers itself as a git credential helper, so the
                // stock helper lookup reaches it.
                let git_config = repo.config().map_err(|e| e.to_string())?;
                callbacks.credentials(move |url, username, _allowed| {
                    Cred::credential_helper(&git_config, url, username)
                        .or_else(|_| Cred::default())
                });
            }
            AuthStrategy::None => {}
        }
        callbacks.transfer_progress(|_progress| !cancel.load(Ordering::Relaxed));

        let mut opts = FetchOptions::new();
        opts.remote_callbacks(callbacks);

        // Empty refspec list = the remote's configured refspecs; this only
        // moves remote-tracking refs, never the working tree.
        remote
            .fetch(&[] as &[&str], Some(&mut opts), None)
            .map_err(|e| e.to_string())
    }
}

/// Name of the remote the current branch tracks, e.g. `origin`.
fn upstream_remote_name(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    let refname = head.name()?;
    let buf = repo.branch_upstream_remote(refname).ok()?;
    buf.as_str().map(String::from)
}
