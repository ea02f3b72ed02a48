use bytes::Bytes;
use http::{
    HeaderValue, Response, StatusCode,
    header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
};
use http_body_util::Full;
use twcache_cache::CacheEntry;
use twcache_proxy::{UpstreamResponse, client_headers};

use crate::{error::PipelineError, state::CACHE_HIT_HEADER};

pub type TwcResponse = Response<Full<Bytes>>;

/// Plain-text response: `message` plus a trailing newline.
pub fn text_response(status: StatusCode, message: &str) -> TwcResponse {
    let mut resp = Response::new(Full::new(Bytes::from(format!("{message}\n"))));
    *resp.status_mut() = status;

    let headers = resp.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    resp
}

pub fn error_response(err: &PipelineError) -> TwcResponse {
    text_response(err.status(), &err.to_string())
}

/// Replay a stored entry: marker header, then the filtered headers it kept.
pub fn from_cache(entry: &CacheEntry) -> TwcResponse {
    let mut resp = Response::new(Full::new(entry.body.clone()));
    *resp.status_mut() = entry.status;

    let headers = resp.headers_mut();
    headers.insert(CACHE_HIT_HEADER.clone(), HeaderValue::from_static("true"));
    entry.headers.apply_to(headers);
    resp
}

/// Relay an upstream answer with its full header set.
pub fn from_upstream(upstream: &UpstreamResponse) -> TwcResponse {
    let mut resp = Response::new(Full::new(upstream.body.clone()));
    *resp.status_mut() = upstream.status;
    *resp.headers_mut() = client_headers(&upstream.headers);
    resp
}
