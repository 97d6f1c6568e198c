use std::{fmt::Debug, path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{Connection, params};

use crate::model::CityCount;

/// How often each city has been successfully forecast.
///
/// `create_or_incr` must be an atomic read-modify-write: N concurrent calls
/// for one name raise its count by exactly N.
#[async_trait]
pub trait CityCountRepository: Send + Sync + Debug {
    async fn create_or_incr(&self, city_name: &str) -> Result<()>;

    /// All counts, sorted by name.
    async fn get_all(&self) -> Result<Vec<CityCount>>;
}

#[derive(Debug, Default)]
pub struct InMemoryCityCounts {
    counts: DashMap<String, u64>,
}

impl InMemoryCityCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CityCountRepository for InMemoryCityCounts {
    async fn create_or_incr(&self, city_name: &str) -> Result<()> {
        *self.counts.entry(city_name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<CityCount>> {
        let mut all: Vec<CityCount> = self
            .counts
            .iter()
            .map(|entry| CityCount { name: entry.key().clone(), count: *entry.value() })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// Counts kept in a SQLite `cities_count` table.
///
/// Queries run on the blocking pool so the runtime's workers never wait on disk.
#[derive(Debug, Clone)]
pub struct SqliteCityCounts {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCityCounts {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open city counts database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("Failed to open in-memory database")?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cities_count (
                name  TEXT PRIMARY KEY NOT NULL,
                count INTEGER NOT NULL CHECK (count >= 0)
            );",
        )
        .context("Failed to create cities_count table")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

#[async_trait]
impl CityCountRepository for SqliteCityCounts {
    async fn create_or_incr(&self, city_name: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let city_name = city_name.to_string();
        tokio::task::spawn_blocking(move || {
            conn.lock()
                .execute(
                    "INSERT INTO cities_count (name, count) VALUES (?1, 1)
                     ON CONFLICT(name) DO UPDATE SET count = count + 1",
                    params![city_name],
                )
                .with_context(|| format!("Failed to increment count for {city_name}"))?;
            Ok::<_, anyhow::Error>(())
        })
        .await?
    }

    async fn get_all(&self) -> Result<Vec<CityCount>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare("SELECT name, count FROM cities_count ORDER BY name")
                .context("Failed to query city counts")?;
            let rows = stmt
                .query_map([], |row| {
                    let count: i64 = row.get(1)?;
                    Ok(CityCount { name: row.get(0)?, count: count.max(0) as u64 })
                })
                .context("Failed to query city counts")?;
            let counts =
                rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to read city counts")?;
            Ok::<_, anyhow::Error>(counts)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn concurrent_increments(repo: Arc<dyn CityCountRepository>, n: usize) {
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.create_or_incr("Rome").await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("increment");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_memory_concurrent_increments_are_not_lost() {
        let repo: Arc<dyn CityCountRepository> = Arc::new(InMemoryCityCounts::new());
        concurrent_increments(Arc::clone(&repo), 200).await;

        let all = repo.get_all().await.expect("all");
        assert_eq!(all, vec![CityCount { name: "Rome".into(), count: 200 }]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sqlite_concurrent_increments_are_not_lost() {
        let repo: Arc<dyn CityCountRepository> = Arc::new(SqliteCityCounts::in_memory().expect("db"));
        concurrent_increments(Arc::clone(&repo), 100).await;

        let all = repo.get_all().await.expect("all");
        assert_eq!(all, vec![CityCount { name: "Rome".into(), count: 100 }]);
    }

    #[tokio::test]
    async fn get_all_is_sorted_by_name() {
        let repo = InMemoryCityCounts::new();
        for name in ["Oslo", "Lima", "Oslo"] {
            repo.create_or_incr(name).await.expect("incr");
        }

        let all = repo.get_all().await.expect("all");
        assert_eq!(
            all,
            vec![
                CityCount { name: "Lima".into(), count: 1 },
                CityCount { name: "Oslo".into(), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn sqlite_counts_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("counts.sqlite");

        {
            let repo = SqliteCityCounts::open(&path).expect("open");
            repo.create_or_incr("London").await.expect("incr");
            repo.create_or_incr("London").await.expect("incr");
        }

        let repo = SqliteCityCounts::open(&path).expect("reopen");
        let all = repo.get_all().await.expect("all");
        assert_eq!(all, vec![CityCount { name: "London".into(), count: 2 }]);
    }

    #[tokio::test]
    async fn sqlite_wait_happens_off_the_runtime_thread() {
        let repo = SqliteCityCounts::in_memory().expect("db");
        let busy = repo.conn.lock();

        let incr = tokio::spawn({
            let repo = repo.clone();
            async move { repo.create_or_incr("Rome").await }
        });
        // Single-threaded runtime: this only wakes if the increment is parked elsewhere.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!incr.is_finished());

        drop(busy);
        incr.await.expect("join").expect("increment");
        assert_eq!(repo.get_all().await.expect("all"), vec![CityCount { name: "Rome".into(), count: 1 }]);
    }

    #[tokio::test]
    async fn empty_repository_returns_empty_list() {
        let repo = SqliteCityCounts::in_memory().expect("db");
        assert!(repo.get_all().await.expect("all").is_empty());
    }
}
