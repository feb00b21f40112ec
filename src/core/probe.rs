use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::auth::{self, AuthCapabilities, AuthStrategy};
use super::fetch::{FetchError, FetchGate};
use super::status::{ProbeError, RepoStatus, StatusFlag};

/// Local working-tree partition: tracked-modified vs untracked-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStatus {
    pub modified: u32,
    pub untracked: u32,
}

/// Position of the current branch relative to its configured upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamPosition {
    pub has_upstream: bool,
    pub ahead: u32,
    pub behind: u32,
}

/// Narrow port over the underlying git implementation: everything the
/// probe needs and nothing else, so tests substitute canned results.
pub trait GitBackend: Send + Sync {
    /// Partition the working tree. Ignored files are excluded.
    fn local_status(&self, path: &Path) -> Result<LocalStatus, ProbeError>;

    /// Ahead/behind counts against the upstream tracking ref.
    fn upstream_position(&self, path: &Path) -> Result<UpstreamPosition, ProbeError>;

    /// URL of the remote the current branch tracks.
    fn remote_url(&self, path: &Path) -> Result<Option<String>, ProbeError>;

    /// One network round trip updating remote-tracking refs only. Must
    /// abort soon after `cancel` is raised.
    fn fetch_remote(
        &self,
        path: &Path,
        strategy: AuthStrategy,
        cancel: &AtomicBool,
    ) -> Result<(), String>;
}

/// Everything a probe needs besides the repository itself.
pub struct ProbeContext {
    pub backend: Arc<dyn GitBackend>,
    pub gate: Arc<FetchGate>,
    pub caps: AuthCapabilities,
    pub enable_fetch: bool,
    pub fetch_timeout: Duration,
    pub local_guard: Duration,
}

/// Compute one repository's status. Never returns an error: every failure
/// mode is folded into the `RepoStatus` itself, so one bad repository
/// cannot abort a cycle.
pub async fn probe(ctx: &ProbeContext, path: &Path, name: &str) -> RepoStatus {
    if !path.exists() {
        return RepoStatus::failed(path, name, ProbeError::InvalidPath);
    }

    // Local step, bounded so a stalled filesystem cannot wedge the cycle.
    let backend = ctx.backend.clone();
    let local_path = path.to_path_buf();
    let local_step = tokio::task::spawn_blocking(move || {
        let local = backend.local_status(&local_path)?;
        let position = backend.upstream_position(&local_path)?;
        let remote_url = backend.remote_url(&local_path)?;
        Ok::<_, ProbeError>((local, position, remote_url))
    });

    let (local, position, remote_url) = match tokio::time::timeout(ctx.local_guard, local_step).await
    {
        Ok(Ok(Ok(observed))) => observed,
        Ok(Ok(Err(kind))) => return RepoStatus::failed(path, name, kind),
        Ok(Err(join_err)) => {
            // A panicked local step is indistinguishable from a stalled one
            // as far as the cycle is concerned.
            log::error!("local status task failed for {}: {join_err}", path.display());
            return RepoStatus::failed(path, name, ProbeError::ProbeTimeout);
        }
        Err(_) => {
            log::warn!(
                "local status for {} exceeded its {}ms guard",
                path.display(),
                ctx.local_guard.as_millis()
            );
            return RepoStatus::failed(path, name, ProbeError::ProbeTimeout);
        }
    };

    let mut status = RepoStatus::clean(path, name);
    if local.modified > 0 {
        status.flags.insert(StatusFlag::Uncommitted);
        status.counts.modified = local.modified;
    }
    if local.untracked > 0 {
        status.flags.insert(StatusFlag::Untracked);
        status.counts.untracked = local.untracked;
    }
    // No upstream configured is not an error; there is just nothing to be
    // ahead of.
    if position.has_upstream && position.ahead > 0 {
        status.flags.insert(StatusFlag::Unpushed);
        status.counts.unpushed = position.ahead;
    }

    if ctx.enable_fetch && position.has_upstream {
        let strategy = auth::resolve(&ctx.caps, remote_url.as_deref());
        if strategy != AuthStrategy::None {
            refresh_upstream(ctx, path, strategy, &mut status).await;
        } else {
            log::debug!("no usable auth for {}; skipping fetch", path.display());
        }
    }

    status
}

/// Fetch through the gate, then re-read the upstream position. Timeout or
/// failure leaves the flag unset; absence of information is not failure,
/// and the local flags already gathered stand.
async fn refresh_upstream(
    ctx: &ProbeContext,
    path: &Path,
    strategy: AuthStrategy,
    status: &mut RepoStatus,
) {
    let backend = ctx.backend.clone();
    let fetch_path = path.to_path_buf();
    let outcome = ctx
        .gate
        .execute(path, ctx.fetch_timeout, move |cancel| {
            backend.fetch_remote(&fetch_path, strategy, &cancel)
        })
        .await;

    match outcome {
        Ok(()) => {}
        Err(FetchError::TimedOut) => {
            log::debug!("fetch timed out for {}", path.display());
            return;
        }
        Err(FetchError::Failed(msg)) => {
            log::debug!("fetch failed for {}: {msg}", path.display());
            return;
        }
    }

    let backend = ctx.backend.clone();
    let reread_path = path.to_path_buf();
    match tokio::task::spawn_blocking(move || backend.upstream_position(&reread_path)).await {
        Ok(Ok(after)) if after.behind > 0 => {
            status.flags.insert(StatusFlag::UpstreamAvailable);
            status.counts.behind_upstream = after.behind;
        }
        Ok(Ok(_)) => {}
        Ok(Err(kind)) => {
            log::debug!(
                "upstream re-read failed for {}: {}",
                path.display(),
                kind.label()
            );
        }
        Err(join_err) => {
            log::error!("upstream re-read task failed for {}: {join_err}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned backend. `position_after` is reported once a fetch ran.
    #[derive(Default)]
    struct FakeBackend {
        local: LocalStatus,
        local_error: Option<ProbeError>,
        position_before: UpstreamPosition,
        position_after: Option<UpstreamPosition>,
        remote: Option<String>,
        fetch_result: Option<String>,
        fetch_delay: Duration,
        fetch_calls: AtomicUsize,
        fetched: AtomicBool,
    }

    impl GitBackend for FakeBackend {
        fn local_status(&self, _path: &Path) -> Result<LocalStatus, ProbeError> {
            match self.local_error {
                Some(kind) => Err(kind),
                None => Ok(self.local),
            }
        }

        fn upstream_position(&self, _path: &Path) -> Result<UpstreamPosition, ProbeError> {
            if self.fetched.load(Ordering::SeqCst) {
                if let Some(after) = self.position_after {
                    return Ok(after);
                }
            }
            Ok(self.position_before)
        }

        fn remote_url(&self, _path: &Path) -> Result<Option<String>, ProbeError> {
            Ok(self.remote.clone())
        }

        fn fetch_remote(
            &self,
            _path: &Path,
            _strategy: AuthStrategy,
            cancel: &AtomicBool,
        ) -> Result<(), String> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let deadline = std::time::Instant::now() + self.fetch_delay;
            while std::time::Instant::now() < deadline {
                if cancel.load(Ordering::Relaxed) {
                    return Err("cancelled".into());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            match &self.fetch_result {
                Some(msg) => Err(msg.clone()),
                None => {
                    self.fetched.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    }

    fn ctx(backend: FakeBackend, caps: AuthCapabilities, enable_fetch: bool) -> ProbeContext {
        ProbeContext {
            backend: Arc::new(backend),
            gate: Arc::new(FetchGate::new()),
            caps,
            enable_fetch,
            fetch_timeout: Duration::from_millis(200),
            local_guard: Duration::from_secs(2),
        }
    }

    fn ssh_caps() -> AuthCapabilities {
        AuthCapabilities {
            ssh_agent: true,
            gh_cli: false,
        }
    }

    fn flags(status: &RepoStatus) -> &BTreeSet<StatusFlag> {
        &status.flags
    }

    #[tokio::test]
    async fn nonexistent_path_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let ctx = ctx(FakeBackend::default(), AuthCapabilities::default(), false);

        let status = probe(&ctx, &missing, "missing").await;
        assert_eq!(status.error, Some(ProbeError::InvalidPath));
        assert!(status.flags.is_empty());
    }

    #[tokio::test]
    async fn modified_tracked_file_sets_exactly_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            local: LocalStatus {
                modified: 1,
                untracked: 0,
            },
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(
            flags(&status),
            &BTreeSet::from([StatusFlag::Uncommitted]),
        );
        assert_eq!(status.counts.modified, 1);
    }

    #[tokio::test]
    async fn untracked_only_sets_exactly_untracked() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            local: LocalStatus {
                modified: 0,
                untracked: 2,
            },
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(flags(&status), &BTreeSet::from([StatusFlag::Untracked]));
        assert_eq!(status.counts.untracked, 2);
    }

    #[tokio::test]
    async fn ahead_of_upstream_is_unpushed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            position_before: UpstreamPosition {
                has_upstream: true,
                ahead: 3,
                behind: 0,
            },
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(flags(&status), &BTreeSet::from([StatusFlag::Unpushed]));
        assert_eq!(status.counts.unpushed, 3);
    }

    #[tokio::test]
    async fn level_with_upstream_is_not_unpushed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            position_before: UpstreamPosition {
                has_upstream: true,
                ahead: 0,
                behind: 0,
            },
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert!(status.flags.is_empty());
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn no_upstream_configured_is_clean_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            position_before: UpstreamPosition {
                has_upstream: false,
                ahead: 5,
                behind: 0,
            },
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert!(status.flags.is_empty());
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn successful_fetch_reveals_upstream_commits() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            position_before: UpstreamPosition {
                has_upstream: true,
                ahead: 0,
                behind: 0,
            },
            position_after: Some(UpstreamPosition {
                has_upstream: true,
                ahead: 0,
                behind: 2,
            }),
            remote: Some("git@github.com:me/repo.git".into()),
            ..Default::default()
        };
        let ctx = ctx(backend, ssh_caps(), true);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(
            flags(&status),
            &BTreeSet::from([StatusFlag::UpstreamAvailable]),
        );
        assert_eq!(status.counts.behind_upstream, 2);
    }

    #[tokio::test]
    async fn fetch_skipped_without_usable_auth() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend {
            position_before: UpstreamPosition {
                has_upstream: true,
                ahead: 0,
                behind: 0,
            },
            remote: Some("git@github.com:me/repo.git".into()),
            ..Default::default()
        });
        let ctx = ProbeContext {
            backend: backend.clone(),
            gate: Arc::new(FetchGate::new()),
            caps: AuthCapabilities::default(),
            enable_fetch: true,
            fetch_timeout: Duration::from_millis(200),
            local_guard: Duration::from_secs(2),
        };

        let status = probe(&ctx, dir.path(), "repo").await;
        assert!(status.flags.is_empty());
        assert!(status.error.is_none());
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_timeout_keeps_local_flags() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            local: LocalStatus {
                modified: 2,
                untracked: 0,
            },
            position_before: UpstreamPosition {
                has_upstream: true,
                ahead: 1,
                behind: 0,
            },
            remote: Some("git@github.com:me/repo.git".into()),
            fetch_delay: Duration::from_secs(5),
            ..Default::default()
        };
        let ctx = ctx(backend, ssh_caps(), true);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(
            flags(&status),
            &BTreeSet::from([StatusFlag::Uncommitted, StatusFlag::Unpushed]),
        );
        assert!(status.error.is_none());
        assert!(!status.flags.contains(&StatusFlag::UpstreamAvailable));
    }

    #[tokio::test]
    async fn backend_open_failure_surfaces_as_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            local_error: Some(ProbeError::NotARepository),
            ..Default::default()
        };
        let ctx = ctx(backend, AuthCapabilities::default(), false);

        let status = probe(&ctx, dir.path(), "repo").await;
        assert_eq!(status.error, Some(ProbeError::NotARepository));
        assert!(status.flags.is_empty());
    }
}
