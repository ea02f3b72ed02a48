use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{API_KEY_ENV, AuthConfig, CacheConfig, ForwardConfig, LogConfig, ServerConfig};

/// Prefix for environment overrides, e.g. `TWCACHE__SERVER__LISTEN`.
pub const ENV_PREFIX: &str = "TWCACHE";

// =======================================================
// TWCACHE CONFIG (root)
// =======================================================
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwcacheConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub forward: ForwardConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl TwcacheConfig {
    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Layer the optional TOML file, `TWCACHE__*` variables and
    /// `CACHE_API_KEY`, in that order.
    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        Self::load(file_name, api_key_from_env())
    }

    fn load(file_name: &str, api_key: Option<String>) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("auth.api_key", non_empty(api_key))?
            .build()?;

        built.try_deserialize()
    }

    /// Like [`from_file`](Self::from_file), but an unreadable or invalid
    /// config is replaced by the defaults. `CACHE_API_KEY` still applies to
    /// the replacement.
    pub fn from_file_or_default(file_name: &str) -> Self {
        Self::load_or_default(file_name, api_key_from_env())
    }

    fn load_or_default(file_name: &str, api_key: Option<String>) -> Self {
        match Self::load(file_name, api_key.clone()) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("Invalid config in '{file_name}':");
                    eprintln!("{report}");
                    eprintln!("Falling back to built-in defaults...");
                    Self::defaults_with_key(api_key)
                } else {
                    if report.warnings().next().is_some() {
                        eprintln!("Config warnings in '{file_name}':");
                        eprintln!("{report}");
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Falling back to built-in defaults...");
                Self::defaults_with_key(api_key)
            }
        }
    }

    fn defaults_with_key(api_key: Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(key) = non_empty(api_key) {
            cfg.auth.api_key = key;
        }
        cfg
    }

    /// One-line-per-field dump for startup logs. The API key is masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("server.listen", self.server.listen.clone()),
            ("server.max_connections", self.server.max_connections.to_string()),
            ("auth.api_key", mask(&self.auth.api_key)),
            ("cache.backend", format!("{:?}", self.cache.backend)),
            ("cache.db_path", self.cache.db_path.clone()),
            ("cache.busy_timeout_ms", self.cache.busy_timeout_ms.to_string()),
            ("cache.max_db_connections", self.cache.max_db_connections.to_string()),
            ("cache.write_behind", self.cache.write_behind.to_string()),
            ("forward.default_timeout_secs", self.forward.default_timeout_secs.to_string()),
            ("forward.min_timeout_secs", self.forward.min_timeout_secs.to_string()),
            ("forward.max_timeout_secs", self.forward.max_timeout_secs.to_string()),
            ("forward.pool_idle_timeout_secs", self.forward.pool_idle_timeout_secs.to_string()),
            ("forward.pool_max_idle_per_host", self.forward.pool_max_idle_per_host.to_string()),
            ("log.level", self.log.level.clone()),
        ]
    }
}

fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "<empty>".into()
    } else {
        format!("<{} chars>", secret.chars().count())
    }
}
