use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    // A stored_at in the future (clock skew) counts as fresh.
    fn is_fresh(&self, now: DateTime<Utc>, expire_after: Duration) -> bool {
        (now - self.stored_at).to_std().map_or(true, |age| age < expire_after)
    }
}

/// Response bodies keyed by full request URL (query string included).
///
/// Expired entries are dropped on every insert. With a `path`, entries
/// survive restarts: the file is read on construction and rewritten after
/// every insert on the blocking pool.
#[derive(Debug)]
pub struct ResponseCache {
    expire_after: Duration,
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Bumped under the `entries` lock so snapshots are ordered.
    generation: AtomicU64,
    /// Generation of the snapshot currently on disk.
    written: Arc<Mutex<u64>>,
}

impl ResponseCache {
    fn with_entries(
        expire_after: Duration,
        path: Option<PathBuf>,
        entries: HashMap<String, CacheEntry>,
    ) -> Self {
        Self {
            expire_after,
            path,
            entries: Mutex::new(entries),
            generation: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
        }
    }

    pub fn in_memory(expire_after: Duration) -> Self {
        Self::with_entries(expire_after, None, HashMap::new())
    }

    pub fn persistent(path: impl Into<PathBuf>, expire_after: Duration) -> Self {
        let path = path.into();
        let entries = match load_entries(&path, expire_after, Utc::now()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Ignoring unreadable response cache {}: {:#}", path.display(), e);
                HashMap::new()
            }
        };
        Self::with_entries(expire_after, Some(path), entries)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.is_fresh(now, self.expire_after) {
            return Some(entry.body.clone());
        }
        entries.remove(key);
        None
    }

    pub async fn insert(&self, key: impl Into<String>, body: impl Into<String>) {
        let Some(snapshot) = self.insert_at(key.into(), body.into(), Utc::now()) else {
            return;
        };
        let Some(path) = self.path.clone() else {
            return;
        };

        let written = Arc::clone(&self.written);
        let result = tokio::task::spawn_blocking(move || {
            let mut written = written.lock();
            if *written >= snapshot.generation {
                return Ok(());
            }
            write_snapshot(&path, &snapshot.json)?;
            *written = snapshot.generation;
            Ok::<_, anyhow::Error>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to persist response cache: {:#}", e),
            Err(e) => tracing::warn!("Response cache writer panicked: {}", e),
        }
    }

    /// Store `body` and prune stale entries. Returns the serialized map when
    /// the cache is file-backed.
    fn insert_at(&self, key: String, body: String, now: DateTime<Utc>) -> Option<Snapshot> {
        let mut entries = self.entries.lock();
        entries.insert(key, CacheEntry { body, stored_at: now });

        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.expire_after));
        if entries.len() < before {
            tracing::debug!(evicted = before - entries.len(), "Pruned expired cache entries");
        }

        if self.path.is_none() {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match serde_json::to_string(&*entries) {
            Ok(json) => Some(Snapshot { generation, json }),
            Err(e) => {
                tracing::warn!("Failed to serialize response cache: {}", e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Snapshot {
    generation: u64,
    json: String,
}

fn load_entries(
    path: &Path,
    expire_after: Duration,
    now: DateTime<Utc>,
) -> Result<HashMap<String, CacheEntry>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
    let mut entries: HashMap<String, CacheEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;
    entries.retain(|_, entry| entry.is_fresh(now, expire_after));
    Ok(entries)
}

fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = ResponseCache::in_memory(Duration::from_secs(60));
        cache.insert("https://x/?a=1", "{}").await;

        assert_eq!(cache.get("https://x/?a=1").as_deref(), Some("{}"));
        assert_eq!(cache.get("https://x/?a=2"), None);
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ResponseCache::in_memory(Duration::from_secs(60));
        let then = Utc::now() - TimeDelta::seconds(61);
        cache.insert_at("k".into(), "old".into(), then);

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn entry_within_window_survives() {
        let cache = ResponseCache::in_memory(Duration::from_secs(60));
        let now = Utc::now();
        cache.insert_at("k".into(), "body".into(), now);

        assert_eq!(cache.get_at("k", now + TimeDelta::seconds(59)).as_deref(), Some("body"));
        assert_eq!(cache.get_at("k", now + TimeDelta::seconds(60)), None);
    }

    #[test]
    fn insert_prunes_stale_entries_for_other_keys() {
        let cache = ResponseCache::in_memory(Duration::from_secs(60));
        let now = Utc::now();
        for i in 0..100 {
            cache.insert_at(format!("old-{i}"), "{}".into(), now - TimeDelta::hours(1));
        }
        cache.insert_at("fresh".into(), "{}".into(), now);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at("fresh", now).as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn persisted_file_drops_stale_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        let cache = ResponseCache::persistent(&path, Duration::from_secs(60));
        let old = Utc::now() - TimeDelta::hours(1);
        for i in 0..10 {
            cache.insert_at(format!("old-{i}"), "{}".into(), old);
        }
        cache.insert("fresh", "{}").await;

        let on_disk: HashMap<String, CacheEntry> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(on_disk.len(), 1);
        assert!(on_disk.contains_key("fresh"));
    }

    #[test]
    fn stale_entries_are_skipped_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let now = Utc::now();

        let mut entries = HashMap::new();
        entries.insert(
            "old".to_string(),
            CacheEntry { body: "{}".into(), stored_at: now - TimeDelta::hours(2) },
        );
        entries.insert("new".to_string(), CacheEntry { body: "{}".into(), stored_at: now });
        fs::write(&path, serde_json::to_string(&entries).expect("serialize")).expect("write");

        let cache = ResponseCache::persistent(&path, DEFAULT_EXPIRE_AFTER);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new").as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn persistent_cache_reloads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.json");

        let cache = ResponseCache::persistent(&path, DEFAULT_EXPIRE_AFTER);
        cache.insert("k", "persisted").await;
        drop(cache);

        let reloaded = ResponseCache::persistent(&path, DEFAULT_EXPIRE_AFTER);
        assert_eq!(reloaded.get("k").as_deref(), Some("persisted"));
    }

    #[test]
    fn corrupt_cache_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").expect("write");

        let cache = ResponseCache::persistent(&path, DEFAULT_EXPIRE_AFTER);
        assert!(cache.is_empty());
    }
}
