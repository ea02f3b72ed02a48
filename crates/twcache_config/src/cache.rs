use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Memory,
}

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// SQLite database file; its directory is created on startup.
    pub db_path: String,
    /// Bounded wait on a locked database (milliseconds).
    pub busy_timeout_ms: u64,
    pub max_db_connections: u32,
    /// Persist entries from a detached task after the response is built.
    pub write_behind: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Sqlite,
            db_path: "data/cache.db".into(),
            busy_timeout_ms: 5000,
            max_db_connections: 16,
            write_behind: false,
        }
    }
}
