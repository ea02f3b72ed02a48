use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    entry::CacheEntry,
    error::CacheError,
    key::CacheKey,
    policy::CachedHeaders,
    store::CacheStore,
};

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS cache (
    key TEXT PRIMARY KEY,
    response BLOB,
    headers TEXT,
    status_code INTEGER,
    created_at INTEGER,
    expires_at INTEGER
)";

const LOOKUP_SQL: &str = "
SELECT response, headers, status_code, created_at, expires_at
FROM cache
WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)";

const UPSERT_SQL: &str = "
INSERT OR REPLACE INTO cache (key, response, headers, status_code, created_at, expires_at)
VALUES (?, ?, ?, ?, ?, ?)";

#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl SqliteOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(5000),
            max_connections: 16,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    response: Option<Vec<u8>>,
    headers: Option<String>,
    status_code: i64,
    created_at: Option<i64>,
    expires_at: Option<i64>,
}

/// SQLite-backed store: WAL journal, `synchronous=NORMAL`, bounded busy wait.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (creating if needed) the database file and the `cache` table.
    #[instrument(skip(opts), fields(path = %opts.path.display()))]
    pub async fn open(opts: &SqliteOptions) -> Result<Self, CacheError> {
        ensure_parent_dir(&opts.path)?;

        let connect = SqliteConnectOptions::new()
            .filename(&opts.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(opts.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(opts.max_connections.max(1))
            .connect_with(connect)
            .await?;

        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;

        info!(
            target: "twcache::cache",
            path = %opts.path.display(),
            busy_timeout_ms = opts.busy_timeout.as_millis() as u64,
            max_connections = opts.max_connections,
            "SQLite cache store ready"
        );

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn decode_row(key: &CacheKey, row: CacheRow) -> Option<CacheEntry> {
        let status = match u16::try_from(row.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
        {
            Some(status) => status,
            None => {
                warn!(
                    target: "twcache::cache",
                    key = %key.short(),
                    status_code = row.status_code,
                    "Stored status code is invalid; treating entry as a miss"
                );
                return None;
            }
        };

        let headers = match row.headers.as_deref().map(CachedHeaders::from_json) {
            Some(Ok(headers)) => headers,
            Some(Err(e)) => {
                warn!(
                    target: "twcache::cache",
                    key = %key.short(),
                    error = %e,
                    "Error decoding cached headers; replaying without them"
                );
                CachedHeaders::default()
            }
            None => CachedHeaders::default(),
        };

        Some(CacheEntry {
            key: key.clone(),
            status,
            headers,
            body: Bytes::from(row.response.unwrap_or_default()),
            created_at: row
                .created_at
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_default(),
            expires_at: row.expires_at.and_then(DateTime::from_timestamp_millis),
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn lookup(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<CacheRow> = sqlx::query_as(LOOKUP_SQL)
            .bind(key.as_str())
            .bind(now.timestamp_millis())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Self::decode_row(key, row)),
            None => {
                debug!(target: "twcache::cache", key = %key.short(), "No valid row for key");
                Ok(None)
            }
        }
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let headers_json = entry.headers.to_json()?;

        sqlx::query(UPSERT_SQL)
            .bind(entry.key.as_str())
            .bind(entry.body.to_vec())
            .bind(headers_json)
            .bind(i64::from(entry.status.as_u16()))
            .bind(entry.created_at.timestamp_millis())
            .bind(entry.expires_at.map(|t| t.timestamp_millis()))
            .execute(&self.pool)
            .await?;

        debug!(
            target: "twcache::cache",
            key = %entry.key.short(),
            status = entry.status.as_u16(),
            bytes = entry.body.len(),
            "Cache row upserted"
        );
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), CacheError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })
}
