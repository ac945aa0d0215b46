//! Durable metadata cache backed by a single-file SQLite store
//!
//! Every external call is fronted by this cache. Entries carry a per-row
//! TTL; expired rows are invisible to [`MetadataCache::get`] but remain
//! readable through [`MetadataCache::get_stale`] until swept. The store is
//! pure cache: deleting the file at any time is safe.
//!
//! When caching is administratively disabled every write is a no-op and
//! every read reports a miss; callers are transparent to this.

use medley_common::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// TTL presets (hours), matched to the volatility of what was fetched
pub mod ttl {
    /// Book metadata rarely changes once published (30 days)
    pub const BOOK_METADATA_HOURS: f64 = 720.0;
    /// Series membership (7 days)
    pub const SERIES_HOURS: f64 = 168.0;
    /// Community ratings drift daily
    pub const RATINGS_HOURS: f64 = 24.0;
    /// Movie / finished-TV metadata (7 days)
    pub const SCREEN_METADATA_HOURS: f64 = 168.0;
    /// Season data of a still-airing show
    pub const AIRING_SEASONS_HOURS: f64 = 24.0;
    /// Raw search result pages
    pub const SEARCH_HOURS: f64 = 1.0;
}

/// Entry returned by the stale-read accessor
#[derive(Debug, Clone)]
pub struct StaleEntry<T> {
    pub value: T,
    pub source: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub hit_count: i64,
    /// True when the entry's TTL has already elapsed
    pub stale: bool,
}

/// Cache statistics (observability only)
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Live (non-expired) entry count
    pub total_entries: i64,
    /// Live entry count per source tag
    pub entries_by_source: BTreeMap<String, i64>,
    /// Approximate hit rate: hits / (hits + live entries)
    pub hit_rate: f64,
}

/// Build a cache key: lowercase, colon-joined `source:part...`, absent
/// parts omitted entirely. Two queries differing only in case or
/// surrounding whitespace normalize to the same key.
pub fn cache_key(source: &str, parts: &[Option<&str>]) -> String {
    let mut components = vec![source.trim().to_lowercase()];
    components.extend(
        parts
            .iter()
            .flatten()
            .map(|part| part.trim().to_lowercase()),
    );
    components.join(":")
}

/// Shared, process-wide metadata cache.
///
/// Constructed once at startup and handed by reference to every adapter;
/// tests substitute isolated in-memory instances.
pub struct MetadataCache {
    db: SqlitePool,
    enabled: bool,
    default_ttl_hours: f64,
}

impl MetadataCache {
    /// Open (creating if missing) the cache store at `path`
    pub async fn open(path: &Path, enabled: bool, default_ttl_hours: f64) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::with_pool(db, enabled, default_ttl_hours).await
    }

    /// In-memory cache for tests
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePool::connect(":memory:").await?;
        Self::with_pool(db, true, ttl::SCREEN_METADATA_HOURS).await
    }

    /// Disabled cache: every read misses, every write no-ops
    pub async fn disabled() -> Result<Self> {
        let db = SqlitePool::connect(":memory:").await?;
        Self::with_pool(db, false, ttl::SCREEN_METADATA_HOURS).await
    }

    async fn with_pool(db: SqlitePool, enabled: bool, default_ttl_hours: f64) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at)")
            .execute(&db)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_source ON cache_entries(source)")
            .execute(&db)
            .await?;

        Ok(Self {
            db,
            enabled,
            default_ttl_hours,
        })
    }

    /// Read a non-expired entry, counting the hit.
    ///
    /// A deserialization failure is treated as a miss and the offending
    /// row is deleted (self-healing against corruption).
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if !self.enabled {
            return Ok(None);
        }

        let now = now_ms();
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        let Some((value,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(parsed) => {
                sqlx::query("UPDATE cache_entries SET hit_count = hit_count + 1 WHERE key = ?")
                    .bind(key)
                    .execute(&self.db)
                    .await?;
                debug!(key, "Cache hit");
                Ok(Some(parsed))
            }
            Err(e) => {
                warn!(key, error = %e, "Corrupt cache entry; deleting");
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    /// Read an entry regardless of expiry, tagged with a staleness flag.
    ///
    /// Used by callers that prefer slightly-old data over an upstream
    /// round trip. Does not count a hit; corrupt rows self-heal as in
    /// [`MetadataCache::get`].
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Result<Option<StaleEntry<T>>> {
        if !self.enabled {
            return Ok(None);
        }

        let row: Option<(String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT value, source, created_at, expires_at, hit_count \
             FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        let Some((value, source, created_at_ms, expires_at_ms, hit_count)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(parsed) => Ok(Some(StaleEntry {
                value: parsed,
                source,
                created_at_ms,
                expires_at_ms,
                hit_count,
                stale: expires_at_ms <= now_ms(),
            })),
            Err(e) => {
                warn!(key, error = %e, "Corrupt cache entry; deleting");
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    /// Upsert an entry. `ttl_hours` falls back to the configured default.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        source: &str,
        ttl_hours: Option<f64>,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let serialized = serde_json::to_string(value)
            .map_err(|e| medley_common::Error::Internal(format!("Cache serialize failed: {}", e)))?;
        let now = now_ms();
        let ttl = ttl_hours.unwrap_or(self.default_ttl_hours);
        let expires_at = now + (ttl * 3_600_000.0) as i64;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, source, created_at, expires_at, hit_count)
            VALUES (?, ?, ?, ?, ?, 0)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                source = excluded.source,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                hit_count = 0
            "#,
        )
        .bind(key)
        .bind(&serialized)
        .bind(source)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        debug!(key, source, ttl_hours = ttl, "Cache write");
        Ok(())
    }

    /// Remove one entry. Idempotent.
    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Remove every entry tagged with `source`. Returns the removed count.
    pub async fn delete_by_source(&self, source: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE source = ?")
            .bind(source)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all expired rows. Returns the removed count.
    pub async fn cleanup(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.db)
            .await?;
        let removed = result.rows_affected();
        debug!(removed, "Cache cleanup");
        Ok(removed)
    }

    /// Live entry counts and an approximate hit rate
    pub async fn stats(&self) -> Result<CacheStats> {
        let now = now_ms();

        let (total_entries, total_hits): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM cache_entries WHERE expires_at > ?",
        )
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) FROM cache_entries WHERE expires_at > ? GROUP BY source",
        )
        .bind(now)
        .fetch_all(&self.db)
        .await?;

        let hit_rate = if total_hits + total_entries > 0 {
            total_hits as f64 / (total_hits + total_entries) as f64
        } else {
            0.0
        };

        Ok(CacheStats {
            total_entries,
            entries_by_source: rows.into_iter().collect(),
            hit_rate,
        })
    }

    /// Raw pool handle, for test setup only
    #[doc(hidden)]
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Wall-clock epoch milliseconds. Rows persist across restarts, so the
/// cache clock is real time rather than the tokio test clock.
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
