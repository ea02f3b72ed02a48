use twcache_config::TwcacheConfig;
use twcache_core::{AppContext, Master};
use tracing::info;
use utils::init_tracing;

const DEFAULT_CONFIG_PATH: &str = "twcache.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let cfg = TwcacheConfig::from_file_or_default(&config_path);
    init_tracing(&cfg.log.level);

    info!(target: "twcache::config", path = %config_path, "Configuration loaded");
    for (field, value) in cfg.summary() {
        info!(target: "twcache::config", field, value = %value, "config");
    }

    let ctx = AppContext::from_config(&cfg).await?;
    Master::new(cfg, ctx).run().await?;

    info!(target: "twcache::master", "Shutdown complete");
    Ok(())
}
