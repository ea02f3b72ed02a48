use std::{future::Future, sync::Arc};

use tokio::{net::TcpListener, sync::Semaphore};
use tracing::{error, info, instrument, warn};
use twcache_config::TwcacheConfig;

use crate::state::AppContext;

mod accept;

use accept::{accept_loop, bind_listener};

pub struct Master {
    cfg: Arc<TwcacheConfig>,
    ctx: Arc<AppContext>,
}

impl Master {
    pub fn new(cfg: TwcacheConfig, ctx: AppContext) -> Self {
        Self {
            cfg: Arc::new(cfg),
            ctx: Arc::new(ctx),
        }
    }

    /// Bind the configured address and serve until Ctrl+C.
    #[instrument(skip(self), fields(
        listen = %self.cfg.server.listen,
        max_connections = self.cfg.server.max_connections,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "twcache::master", "Starting TWCACHE MASTER");

        let listener = bind_listener(&self.cfg.server.listen).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running to completion on their own
    /// tasks; only the accept loop stops.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let listen_addr = match listener.local_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => self.cfg.server.listen.clone(),
        };

        // Global limit for concurrently served connections
        let max_conns = self.cfg.server.max_connections.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));

        info!(
            target: "twcache::master",
            listen = %listen_addr,
            max_conns,
            "Master initialized. Waiting for incoming connections (Ctrl+C to stop)..."
        );

        tokio::select! {
            res = accept_loop(listener, listen_addr.clone(), semaphore, self.ctx.clone()) => {
                if let Err(e) = &res {
                    error!(
                        target: "twcache::master",
                        listen = %listen_addr,
                        error = ?e,
                        "accept_loop exited with an error"
                    );
                }
                res
            }
            _ = shutdown => {
                warn!(
                    target: "twcache::master",
                    listen = %listen_addr,
                    "Shutdown requested; no longer accepting connections"
                );
                Ok(())
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(
            target: "twcache::master",
            error = ?e,
            "Failed to listen for Ctrl+C; serving until killed"
        );
        std::future::pending::<()>().await;
    }
}
