//! Cache storage trait and SQLite implementation.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::network::{Request, Response, ResponseKind};

/// A response read back from a bucket.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

/// Named buckets of request → response entries.
///
/// Every method is a single atomic unit; callers never hold a lock across
/// two calls.
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist.
    fn open_bucket(&self, name: &str) -> Result<()>;

    fn has_bucket(&self, name: &str) -> Result<bool>;

    fn bucket_names(&self) -> Result<Vec<String>>;

    /// Delete a bucket and all its entries. Returns false if it did not exist.
    fn delete_bucket(&self, name: &str) -> Result<bool>;

    fn match_request(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>>;

    /// Store one entry, replacing any previous entry for the same request.
    fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()>;

    /// Store several entries in one transaction: all are written or none.
    fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()>;

    fn entry_count(&self, bucket: &str) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_buckets (
    name        TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cache_entries (
    bucket        TEXT NOT NULL REFERENCES cache_buckets(name) ON DELETE CASCADE,
    method        TEXT NOT NULL,
    url           TEXT NOT NULL,
    status        INTEGER NOT NULL,
    kind          TEXT NOT NULL,
    content_type  TEXT,
    body          BLOB NOT NULL,
    cached_at     TEXT NOT NULL,
    PRIMARY KEY (bucket, method, url)
);
"#;

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set cache pragmas")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(CACHE_SCHEMA)
            .context("Failed to create cache tables")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {e}"))
    }
}

fn insert_entry(
    conn: &Connection,
    bucket: &str,
    request: &Request,
    response: &Response,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO cache_entries (bucket, method, url, status, kind, content_type, body, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(bucket, method, url) DO UPDATE SET
            status = ?4, kind = ?5, content_type = ?6, body = ?7, cached_at = ?8",
        params![
            bucket,
            request.method.as_str(),
            request.cache_url(),
            response.status,
            response.kind.as_str(),
            response.content_type,
            response.body,
            Utc::now().to_rfc3339(),
        ],
    )
}

impl CacheStorage for SqliteCache {
    fn open_bucket(&self, name: &str) -> Result<()> {
        self.lock()?.execute(
            "INSERT OR IGNORE INTO cache_buckets (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn has_bucket(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM cache_buckets WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?)
    }

    fn bucket_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn delete_bucket(&self, name: &str) -> Result<bool> {
        let n = self
            .lock()?
            .execute("DELETE FROM cache_buckets WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }

    fn match_request(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT status, kind, content_type, body, cached_at FROM cache_entries
             WHERE bucket = ?1 AND method = ?2 AND url = ?3",
            params![bucket, request.method.as_str(), request.cache_url()],
            |row| {
                let kind: String = row.get(1)?;
                let cached_at: String = row.get(4)?;
                Ok(CachedResponse {
                    response: Response {
                        status: row.get(0)?,
                        kind: ResponseKind::parse(&kind),
                        content_type: row.get(2)?,
                        body: row.get(3)?,
                    },
                    cached_at: DateTime::parse_from_rfc3339(&cached_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_default(),
                })
            },
        );
        match result {
            Ok(hit) => Ok(Some(hit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
        let conn = self.lock()?;
        insert_entry(&conn, bucket, request, response)
            .with_context(|| format!("Failed to cache {}", request.url))?;
        Ok(())
    }

    fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (request, response) in entries {
            insert_entry(&tx, bucket, request, response)
                .with_context(|| format!("Failed to cache {}", request.url))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn entry_count(&self, bucket: &str) -> Result<usize> {
        let n: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE bucket = ?1",
            params![bucket],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
