use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

/// Why a gated network operation produced no result. Cloneable so every
/// waiter attached to the same round trip receives the shared outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch timed out")]
    TimedOut,

    #[error("fetch failed: {0}")]
    Failed(String),
}

type Outcome = Result<(), FetchError>;

enum Role {
    Leader(broadcast::Sender<Outcome>),
    Follower(broadcast::Receiver<Outcome>),
}

/// Bounds and de-duplicates network-touching operations.
///
/// Guarantees: no operation for a key runs past its timeout, and no two
/// operations for the same key run concurrently. A second caller attaches
/// to the in-flight outcome instead of issuing a duplicate round trip.
pub struct FetchGate {
    in_flight: Mutex<HashMap<PathBuf, broadcast::Sender<Outcome>>>,
}

impl FetchGate {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` on the blocking pool under a hard timeout.
    ///
    /// On expiry the cancel flag handed to `op` is raised (git2 observes it
    /// from its transfer-progress callback) and the caller gets
    /// `TimedOut` immediately; the abandoned transfer aborts at its next
    /// progress tick.
    pub async fn execute<F>(&self, key: &Path, timeout: Duration, op: F) -> Outcome
    where
        F: FnOnce(Arc<AtomicBool>) -> Result<(), String> + Send + 'static,
    {
        let role = {
            let mut in_flight = self.in_flight.lock().expect("gate lock poisoned");
            match in_flight.get(key) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(key.to_path_buf(), tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                log::debug!("attaching to in-flight fetch for {}", key.display());
                rx.recv()
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Failed("fetch abandoned".into())))
            }
            Role::Leader(tx) => {
                let cancel = Arc::new(AtomicBool::new(false));
                let worker_cancel = cancel.clone();
                let work = tokio::task::spawn_blocking(move || op(worker_cancel));

                let outcome = match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(msg))) => Err(FetchError::Failed(msg)),
                    Ok(Err(join_err)) => Err(FetchError::Failed(join_err.to_string())),
                    Err(_) => {
                        cancel.store(true, Ordering::Relaxed);
                        Err(FetchError::TimedOut)
                    }
                };

                // Unregister before publishing so a caller arriving after the
                // send starts a fresh round trip instead of waiting forever.
                self.in_flight
                    .lock()
                    .expect("gate lock poisoned")
                    .remove(key);
                let _ = tx.send(outcome.clone());
                outcome
            }
        }
    }
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn concurrent_requests_share_one_round_trip() {
        let gate = Arc::new(FetchGate::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let op = |calls: Arc<AtomicUsize>| {
            move |_cancel: Arc<AtomicBool>| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            }
        };

        let key = Path::new("/repo");
        let timeout = Duration::from_secs(5);
        let (a, b) = tokio::join!(
            gate.execute(key, timeout, op(calls.clone())),
            gate.execute(key, timeout, op(calls.clone())),
        );

        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let gate = Arc::new(FetchGate::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let op = |calls: Arc<AtomicUsize>| {
            move |_cancel: Arc<AtomicBool>| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let timeout = Duration::from_secs(5);
        let (a, b) = tokio::join!(
            gate.execute(Path::new("/one"), timeout, op(calls.clone())),
            gate.execute(Path::new("/two"), timeout, op(calls.clone())),
        );

        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sequential_requests_each_fetch() {
        let gate = FetchGate::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Path::new("/repo");

        for _ in 0..2 {
            let calls = calls.clone();
            let outcome = gate
                .execute(key, Duration::from_secs(5), move |_cancel| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert_eq!(outcome, Ok(()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_returns_promptly_and_raises_cancel() {
        let gate = FetchGate::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let seen = cancelled.clone();

        let outcome = gate
            .execute(Path::new("/slow"), Duration::from_millis(50), move |cancel| {
                while !cancel.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(10));
                }
                seen.store(true, Ordering::Relaxed);
                Err("aborted".into())
            })
            .await;

        assert_eq!(outcome, Err(FetchError::TimedOut));

        // the abandoned operation notices the flag and winds down
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cancelled.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn failure_message_reaches_every_waiter() {
        let gate = Arc::new(FetchGate::new());
        let key = Path::new("/bad");
        let timeout = Duration::from_secs(5);

        let op = || {
            |_cancel: Arc<AtomicBool>| {
                std::thread::sleep(Duration::from_millis(50));
                Err("remote hung up".to_string())
            }
        };

        let (a, b) = tokio::join!(
            gate.execute(key, timeout, op()),
            gate.execute(key, timeout, op()),
        );

        assert_eq!(a, Err(FetchError::Failed("remote hung up".into())));
        assert_eq!(a, b);
    }
}
