use serde::Deserialize;

// =======================================================
// FORWARD CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    // Per-request deadline (seconds)
    pub default_timeout_secs: u64,
    pub min_timeout_secs: u64,
    pub max_timeout_secs: u64,

    // Outbound connection pool
    pub pool_idle_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 15,
            min_timeout_secs: 5,
            max_timeout_secs: 120,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

impl ForwardConfig {
    /// True when `secs` is an accepted `twc_timeout` value.
    pub fn timeout_in_range(&self, secs: u64) -> bool {
        (self.min_timeout_secs..=self.max_timeout_secs).contains(&secs)
    }
}
