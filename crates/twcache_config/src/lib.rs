pub mod cache;
pub mod forward;
pub mod server;
pub mod twcache;
pub mod validation;

pub use cache::{CacheBackend, CacheConfig};
pub use forward::ForwardConfig;
pub use server::{API_KEY_ENV, AuthConfig, DEFAULT_API_KEY, LogConfig, ServerConfig};
pub use twcache::{ENV_PREFIX, TwcacheConfig};
pub use validation::ConfigReport;
