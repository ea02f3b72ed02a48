use std::{fmt::Display, sync::Arc, time::Instant};

use bytes::Bytes;
use chrono::Utc;
use http::Request;
use http_body_util::BodyExt;
use hyper::body::Body;
use tracing::{debug, error, info, instrument, warn};
use twcache_cache::{CacheEntry, CacheKey, CacheStore};
use twcache_proxy::OutboundRequest;

use crate::{
    error::{ErrorClass, PipelineError},
    params::parse_params,
    responses::{TwcResponse, error_response, from_cache, from_upstream},
    state::AppContext,
};

/// How a successful response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// `twc_skip_cache=true`: the store was not touched.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Bypass => "bypass",
        }
    }
}

/// =======================================================
/// REQUEST PIPELINE
/// =======================================================
///
/// AuthCheck -> Validate -> (CacheLookup) -> Forward -> Respond -> (CacheWrite).
/// Every hard failure becomes a plain-text error response; this never fails.
#[instrument(
    skip_all,
    fields(method = %req.method(), path = %req.uri().path())
)]
pub async fn handle<B>(ctx: &Arc<AppContext>, req: Request<B>) -> TwcResponse
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let started = Instant::now();

    match run(ctx, req).await {
        Ok((cache, resp)) => {
            info!(
                target: "twcache::pipeline",
                cache = cache.as_str(),
                status = resp.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request served"
            );
            resp
        }
        Err(e) => {
            let status = e.status().as_u16();
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match e.class() {
                ErrorClass::Auth | ErrorClass::ClientInput => warn!(
                    target: "twcache::pipeline",
                    status,
                    elapsed_ms,
                    error = %e,
                    "Request rejected"
                ),
                ErrorClass::Gateway | ErrorClass::Internal => error!(
                    target: "twcache::pipeline",
                    status,
                    elapsed_ms,
                    error = %e,
                    "Request failed"
                ),
            }
            error_response(&e)
        }
    }
}

async fn run<B>(
    ctx: &Arc<AppContext>,
    req: Request<B>,
) -> Result<(CacheStatus, TwcResponse), PipelineError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();

    ctx.authorize(&parts.headers)?;

    let params = parse_params(parts.uri.query(), ctx.forward_limits(), Utc::now())?;

    let body = body
        .collect()
        .await
        .map_err(|e| PipelineError::ReadBody(e.to_string()))?
        .to_bytes();

    let key = CacheKey::derive(parts.method.as_str(), &params.target, &body);
    debug!(
        target: "twcache::pipeline",
        key = %key.short(),
        target_url = %params.target,
        skip_cache = params.skip_cache,
        timeout_secs = params.timeout.as_secs(),
        "Request validated"
    );

    if !params.skip_cache {
        if let Some(entry) = ctx.store().lookup(&key, Utc::now()).await? {
            debug!(
                target: "twcache::pipeline",
                key = %key.short(),
                status = entry.status.as_u16(),
                "Cache hit"
            );
            return Ok((CacheStatus::Hit, from_cache(&entry)));
        }
        debug!(target: "twcache::pipeline", key = %key.short(), "Cache miss");
    }

    let upstream = ctx
        .forwarder()
        .forward(OutboundRequest {
            method: parts.method,
            url: params.url,
            headers: parts.headers,
            body,
            timeout: params.timeout,
        })
        .await?;

    let resp = from_upstream(&upstream);
    if params.skip_cache {
        return Ok((CacheStatus::Bypass, resp));
    }

    let entry = CacheEntry::from_response(
        key,
        upstream.status,
        &upstream.headers,
        upstream.body,
        Utc::now(),
        params.expires_at,
    );
    persist(ctx, entry).await;

    Ok((CacheStatus::Miss, resp))
}

/// Store a freshly forwarded response. Failures are logged, never returned.
async fn persist(ctx: &Arc<AppContext>, entry: CacheEntry) {
    if ctx.write_behind() {
        let store = ctx.store().clone();
        tokio::spawn(async move {
            write_entry(store.as_ref(), &entry).await;
        });
    } else {
        write_entry(ctx.store().as_ref(), &entry).await;
    }
}

async fn write_entry(store: &dyn CacheStore, entry: &CacheEntry) {
    match store.upsert(entry).await {
        Ok(()) => debug!(
            target: "twcache::pipeline",
            key = %entry.key.short(),
            headers = entry.headers.len(),
            expires_at = ?entry.expires_at,
            "Response cached"
        ),
        Err(e) => warn!(
            target: "twcache::pipeline",
            key = %entry.key.short(),
            error = %e,
            "Error writing cache entry"
        ),
    }
}
