use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset: `base` for everything, with the
/// service's own subsystems one notch more verbose when `base` is `info`.
pub fn default_filter(base: &str) -> String {
    let base = base.trim();
    let base = if base.is_empty() { "info" } else { base };
    if base.eq_ignore_ascii_case("info") {
        "info,twcache=debug".to_string()
    } else {
        base.to_string()
    }
}

pub fn init_tracing(base_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(base_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();
}
