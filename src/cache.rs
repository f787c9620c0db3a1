//! Content-addressable disk cache
//!
//! Maps a `(version_salt, input)` pair to a stable file path under a cache
//! root and memoizes producer results there. Entries become visible only
//! through an atomic rename, so readers see a complete entry or none.
//! Storage is reclaimed by sweeping entries whose last access time exceeds
//! a TTL.
//!
//! # Sharing model
//!
//! Any number of threads or processes may operate on the same cache root.
//! There is no per-fingerprint locking: two writers racing on the same miss
//! both compute, and the last atomic rename wins. Readers never observe a
//! torn write. A file vanishing between check and open (eviction race) is
//! an ordinary miss.

use crate::error::{MemoError, MemoResult};
use crate::fingerprint::fingerprint;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;
use tracing::debug;

/// Default entry time-to-live: one week
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Default minimum spacing between opportunistic collections
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(60);

/// File extension for cache entries
const ENTRY_EXT: &str = "memo";

/// Leading bytes of every well-formed entry. A file without this header is
/// treated as corrupt: an ordinary miss, recomputed and overwritten.
const ENTRY_MAGIC: &[u8] = b"dmemo1\n";

/// Content-addressable disk cache for memoized computation results.
///
/// Construction touches nothing on disk; the namespace directory is created
/// lazily on the first write. The instance holds no open handles or locks
/// between calls, so dropping it requires no teardown.
pub struct DiskCache {
    root: PathBuf,
    version_salt: String,
    ttl: Duration,
    collect_interval: Duration,
    /// When this instance last completed a collection. Instance-owned on
    /// purpose: instances sharing a root pace their collections
    /// independently.
    last_collect: Mutex<Option<Instant>>,
}

impl DiskCache {
    /// Create a cache rooted at `root`, namespaced by `version_salt`, with
    /// the default one-week TTL.
    ///
    /// A leading `~` in `root` is expanded to the user's home directory.
    /// Changing the salt points the cache at a fresh namespace; entries
    /// under the old salt are never seen again and simply age out.
    pub fn new(root: impl AsRef<Path>, version_salt: impl Into<String>) -> Self {
        Self {
            root: expand_home(root.as_ref()),
            version_salt: version_salt.into(),
            ttl: DEFAULT_TTL,
            collect_interval: DEFAULT_COLLECT_INTERVAL,
            last_collect: Mutex::new(None),
        }
    }

    /// Override how long an entry may go unread before collection removes it
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the minimum spacing between opportunistic collections
    pub fn with_collect_interval(mut self, interval: Duration) -> Self {
        self.collect_interval = interval;
        self
    }

    /// Content-addressable location of `input` within this namespace.
    ///
    /// Deterministic and purely computational: two caches over the same
    /// root agree on paths exactly when their salts agree.
    pub fn entry_path(&self, input: &str) -> PathBuf {
        let digest = fingerprint(&self.version_salt, input);
        self.root
            .join(&self.version_salt)
            .join(format!("{}.{}", digest, ENTRY_EXT))
    }

    /// Return the cached bytes for `input`, computing and persisting them
    /// via `produce` on a miss.
    ///
    /// If at least the collection interval has elapsed since this instance
    /// last collected, a collection runs first; the lookup itself always
    /// proceeds. Reading a hit refreshes the entry's access time, which is
    /// what keeps hot entries alive across collections.
    ///
    /// `produce` may be invoked by several racing callers at once (there is
    /// no cross-process mutual exclusion), so it must tolerate running more
    /// than once. Its failure propagates unchanged; wrap foreign errors
    /// with [`MemoError::producer`].
    pub fn lookup_or_compute<F>(&self, input: &str, produce: F) -> MemoResult<Vec<u8>>
    where
        F: FnOnce() -> MemoResult<Vec<u8>>,
    {
        self.maybe_collect();

        let path = self.entry_path(input);
        let dir = namespace_dir(&path, &self.root);
        fs::create_dir_all(dir).map_err(|e| MemoError::storage_write(&path, e))?;

        if let Some(payload) = read_entry(&path) {
            debug!("Cache hit for {}", path.display());
            return Ok(payload);
        }

        debug!("Cache miss for {}", path.display());
        let payload = produce()?;
        self.write_entry(&path, &payload)?;
        Ok(payload)
    }

    /// Delete every entry in the cache root whose last access is older than
    /// the TTL, then best-effort prune empty namespace directories.
    ///
    /// Collection is namespace-agnostic: it sweeps the whole shared root,
    /// not just this instance's salt. Every per-file failure is tolerated
    /// silently; a concurrent collector or reader may legitimately win any
    /// individual race. Directory pruning is cosmetic and never required
    /// for correctness.
    pub fn collect(&self) {
        sweep_tree(&self.root, SystemTime::now(), self.ttl);
        let mut last = self
            .last_collect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Some(Instant::now());
    }

    /// Run a collection if enough time has passed since the last one.
    ///
    /// Claims the timestamp before sweeping so concurrent lookups on the
    /// same instance do not pile onto one collection.
    fn maybe_collect(&self) {
        let due = {
            let mut last = self
                .last_collect
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *last {
                Some(at) if at.elapsed() < self.collect_interval => false,
                _ => {
                    *last = Some(Instant::now());
                    true
                }
            }
        };
        if due {
            self.collect();
        }
    }

    /// Stage `payload` in a uniquely named temp file inside the namespace
    /// directory, then atomically rename it onto `path`.
    ///
    /// The temp file lives in the same directory tree as the final path so
    /// the rename never crosses a filesystem boundary. On any failure the
    /// temp file is abandoned and `path` is left untouched.
    fn write_entry(&self, path: &Path, payload: &[u8]) -> MemoResult<()> {
        let dir = namespace_dir(path, &self.root);
        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| MemoError::storage_write(path, e))?;
        tmp.write_all(ENTRY_MAGIC)
            .map_err(|e| MemoError::storage_write(path, e))?;
        tmp.write_all(payload)
            .map_err(|e| MemoError::storage_write(path, e))?;
        // Rename is atomic; no fsync needed, worst case the entry is
        // rebuilt on the next lookup.
        tmp.persist(path)
            .map_err(|e| MemoError::storage_write(path, e.error))?;
        debug!("Persisted cache entry {}", path.display());
        Ok(())
    }
}

/// Namespace directory of an entry path. Entries always sit one level below
/// the root, so the parent always exists as a path.
fn namespace_dir<'a>(path: &'a Path, root: &'a Path) -> &'a Path {
    path.parent().unwrap_or(root)
}

/// Read and validate an entry. Returns `None` for missing, unreadable, or
/// corrupt files so every failure mode lands on the miss path.
fn read_entry(path: &Path) -> Option<Vec<u8>> {
    let data = fs::read(path).ok()?;
    match data.strip_prefix(ENTRY_MAGIC) {
        Some(payload) => Some(payload.to_vec()),
        None => {
            debug!("Discarding corrupt cache entry {}", path.display());
            None
        }
    }
}

/// Recursively delete stale files under `dir`, then try to remove emptied
/// subdirectories. All errors are swallowed: collection competes with
/// readers, writers, and other collectors by design.
fn sweep_tree(dir: &Path, now: SystemTime, ttl: Duration) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            sweep_tree(&path, now, ttl);
            // Fails while non-empty or already gone; both fine.
            let _ = fs::remove_dir(&path);
        } else {
            remove_if_stale(&path, now, ttl);
        }
    }
}

/// Delete `path` if its last access is older than `ttl`.
///
/// Falls back to the modification time on filesystems that do not report
/// access times. A timestamp in the future counts as fresh.
fn remove_if_stale(path: &Path, now: SystemTime, ttl: Duration) {
    let Ok(meta) = fs::metadata(path) else {
        return;
    };
    let Ok(accessed) = meta.accessed().or_else(|_| meta.modified()) else {
        return;
    };
    let stale = now
        .duration_since(accessed)
        .map(|age| age > ttl)
        .unwrap_or(false);
    if stale {
        debug!("Evicting stale cache entry {}", path.display());
        let _ = fs::remove_file(path);
    }
}

/// Expand a leading `~` component to the user's home directory
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
