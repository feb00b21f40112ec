use std::sync::{Arc, Mutex};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::config::types::VigilConfig;

use super::aggregate;
use super::auth::AuthCapabilities;
use super::cache::StatusCache;
use super::fetch::FetchGate;
use super::probe::{self, GitBackend, ProbeContext};
use super::status::{AggregateStatus, ProbeError, RepoStatus};

/// Control events consumed between cycles. Refresh never cancels work
/// already in flight; it only empties the cache so the next read probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Refresh,
    Shutdown,
}

/// Drives the polling loop: probes every configured repository through
/// the cache, aggregates, and hands the result to the emitter boundary.
pub struct Monitor {
    config: VigilConfig,
    backend: Arc<dyn GitBackend>,
    cache: Arc<StatusCache>,
    gate: Arc<FetchGate>,
    latest: Mutex<Vec<RepoStatus>>,
}

impl Monitor {
    pub fn new(config: VigilConfig, backend: Arc<dyn GitBackend>) -> Self {
        Self {
            config,
            backend,
            cache: Arc::new(StatusCache::default()),
            gate: Arc::new(FetchGate::new()),
            latest: Mutex::new(Vec::new()),
        }
    }

    /// The last completed cycle's statuses, in configured order. This is
    /// what the dropdown boundary renders without re-probing.
    pub fn latest(&self) -> Vec<RepoStatus> {
        self.latest.lock().expect("latest lock poisoned").clone()
    }

    /// Drop every cached status so the next cycle re-probes everything.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    /// One probe-and-aggregate pass over the configured repositories.
    pub async fn run_cycle(&self) -> (AggregateStatus, Vec<RepoStatus>) {
        // The environment rarely changes mid-cycle; detect once, not per repo.
        let caps = if self.config.auth.enable_fetch {
            AuthCapabilities::detect(&self.config.auth).await
        } else {
            AuthCapabilities::default()
        };

        let repos = self.config.repositories.clone();
        let limit = self
            .config
            .advanced
            .parallel_checks
            .min(repos.len())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let ttl = self.config.cache_ttl();
        let ctx = Arc::new(ProbeContext {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
            caps,
            enable_fetch: self.config.auth.enable_fetch,
            fetch_timeout: self.config.fetch_timeout(),
            local_guard: self.config.local_guard(),
        });

        let mut join_set = JoinSet::new();
        for (idx, entry) in repos.iter().cloned().enumerate() {
            let ctx = ctx.clone();
            let cache = self.cache.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let name = entry.display_name();
                let status = match cache.get(&entry.path) {
                    Some(cached) => cached,
                    None => {
                        let status = probe::probe(&ctx, &entry.path, &name).await;
                        cache.put(status.clone(), ttl);
                        status
                    }
                };
                (idx, status)
            });
        }

        let mut slots: Vec<Option<RepoStatus>> = vec![None; repos.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, status)) => slots[idx] = Some(status),
                Err(err) => log::error!("probe task failed: {err}"),
            }
        }

        // One entry per configured repository, even if its task died.
        let statuses: Vec<RepoStatus> = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    RepoStatus::failed(
                        &repos[idx].path,
                        &repos[idx].display_name(),
                        ProbeError::ProbeTimeout,
                    )
                })
            })
            .collect();

        let aggregated = aggregate::aggregate(&statuses);
        *self.latest.lock().expect("latest lock poisoned") = statuses.clone();
        (aggregated, statuses)
    }

    /// Polling loop: one cycle per tick, an immediate extra cycle on
    /// manual refresh, until shutdown or the emitter hangs up.
    pub async fn run<F>(&self, mut control: mpsc::Receiver<ControlEvent>, mut emit: F)
    where
        F: FnMut(&AggregateStatus, &[RepoStatus]) -> std::io::Result<()>,
    {
        loop {
            let (aggregated, statuses) = self.run_cycle().await;
            if let Err(err) = emit(&aggregated, &statuses) {
                log::info!("output consumer disconnected: {err}");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {}
                event = control.recv() => match event {
                    Some(ControlEvent::Refresh) => {
                        log::info!("manual refresh requested");
                        self.invalidate();
                    }
                    Some(ControlEvent::Shutdown) | None => break,
                }
            }
        }
    }
}
