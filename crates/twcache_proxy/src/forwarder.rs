use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, Method, StatusCode};
use tracing::{debug, instrument, warn};
use twcache_config::ForwardConfig;
use url::Url;

use crate::{error::ForwardError, headers::outbound_headers};

/// Redirect hops followed before the last response is relayed as-is.
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    /// Inbound headers, unfiltered; the forwarder strips what must not leave.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Deadline for the whole exchange, body included.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Relays one request to its target and buffers the answer.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    auth_header: HeaderName,
}

impl Forwarder {
    /// `auth_header` is removed from every outbound request.
    pub fn new(cfg: &ForwardConfig, auth_header: HeaderName) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(cfg.pool_idle_timeout_secs))
            .pool_max_idle_per_host(cfg.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            client,
            auth_header,
        })
    }

    #[instrument(
        skip(self, req),
        fields(
            method = %req.method,
            url = %req.url,
            timeout_secs = req.timeout.as_secs(),
        )
    )]
    pub async fn forward(&self, req: OutboundRequest) -> Result<UpstreamResponse, ForwardError> {
        let headers = outbound_headers(&req.headers, &self.auth_header);

        let request = self
            .client
            .request(req.method, req.url)
            .headers(headers)
            .body(req.body)
            .timeout(req.timeout)
            .build()
            .map_err(ForwardError::Build)?;

        let response = match self.client.execute(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    target: "twcache::proxy",
                    error = %e,
                    timeout = e.is_timeout(),
                    "Upstream request failed"
                );
                return Err(ForwardError::Transport(e));
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    target: "twcache::proxy",
                    %status,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Failed to read upstream body"
                );
                return Err(ForwardError::Body(e));
            }
        };

        debug!(
            target: "twcache::proxy",
            %status,
            headers = headers.len(),
            bytes = body.len(),
            "Upstream response received"
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
