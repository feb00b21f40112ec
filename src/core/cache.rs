use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::status::RepoStatus;

/// Time source for cache expiry. Injected so tests control it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    status: RepoStatus,
    expires_at: Instant,
}

/// TTL memoization of probe results, keyed by repository path.
///
/// The only shared mutable state that outlives a cycle. A single coarse
/// mutex is enough for the repository counts this tool monitors, and
/// guarantees a reader never observes a half-written status.
pub struct StatusCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl StatusCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The cached status, or `None` once the entry's TTL has lapsed.
    pub fn get(&self, path: &Path) -> Option<RepoStatus> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(path)
            .filter(|entry| self.clock.now() < entry.expires_at)
            .map(|entry| entry.status.clone())
    }

    /// Store a fresh status. Last writer wins.
    pub fn put(&self, status: RepoStatus, ttl: Duration) {
        let entry = CacheEntry {
            expires_at: self.clock.now() + ttl,
            status,
        };
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(entry.status.path.clone(), entry);
    }

    /// Drop every entry, forcing the next cycle to re-probe everything.
    pub fn invalidate_all(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
