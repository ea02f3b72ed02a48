use serde::Deserialize;

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address of the single HTTP entry point.
    pub listen: String,
    /// Upper bound on connections served at the same time.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            max_connections: 1024,
        }
    }
}

// =======================================================
// AUTH CONFIG + DEFAULTS
// =======================================================
/// Environment variable that overrides `auth.api_key`.
pub const API_KEY_ENV: &str = "CACHE_API_KEY";

/// Fallback secret for local, non-production runs.
pub const DEFAULT_API_KEY: &str = "testing";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.into(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

// =======================================================
// LOG CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
