use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use hyper::{Request, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Instrument, debug, error, info, instrument};

use crate::{pipeline::handle, state::AppContext};

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(listen_addr).await.inspect_err(|e| {
        error!(target: "twcache::master", listen = %listen_addr, error = ?e, "Failed to bind listener");
    })?;

    info!(target: "twcache::master", listen = %listen_addr, "Listening");
    Ok(listener)
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

/// Wait for a free connection slot, then for the next client.
async fn accept_with_permit(
    listener: &TcpListener,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    // Only fails once the semaphore is closed.
    let permit = semaphore.clone().acquire_owned().await?;

    let (stream, addr) = listener.accept().await.inspect_err(|e| {
        error!(target: "twcache::master", error = ?e, "accept() failed");
    })?;

    debug!(
        target: "twcache::master",
        client_addr = %addr,
        free_slots = semaphore.available_permits(),
        "Client connected"
    );

    Ok(AcceptedConn {
        stream,
        addr,
        permit,
    })
}

#[instrument(
    skip(listener, semaphore, ctx),
    fields(
        listen = %listen_addr,
        max_connections = semaphore.available_permits(),
    )
)]
pub(crate) async fn accept_loop(
    listener: TcpListener,
    listen_addr: String,
    semaphore: Arc<Semaphore>,
    ctx: Arc<AppContext>,
) -> anyhow::Result<()> {
    debug!(target: "twcache::master", "Accept loop running");

    loop {
        let AcceptedConn {
            stream,
            addr,
            permit,
        } = accept_with_permit(&listener, &semaphore).await?;

        let ctx = ctx.clone();
        let span = tracing::info_span!("connection", client_addr = %addr);

        tokio::spawn(
            async move {
                let _permit = permit;

                if let Err(e) = serve_connection(stream, ctx).await {
                    debug!(
                        target: "twcache::master",
                        client_addr = %addr,
                        error = %e,
                        "Connection closed with error"
                    );
                }

                debug!(target: "twcache::master", client_addr = %addr, "Client disconnected");
            }
            .instrument(span),
        );
    }
}

async fn serve_connection(stream: TcpStream, ctx: Arc<AppContext>) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(handle(&ctx, req).await) }
    });

    http1::Builder::new().serve_connection(io, service).await
}
