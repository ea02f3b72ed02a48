use std::{borrow::Cow, time::Duration};

use chrono::{DateTime, Utc};
use twcache_cache::CachePolicy;
use twcache_config::ForwardConfig;
use url::{Url, form_urlencoded};

use crate::error::PipelineError;

pub const TARGET_URL_PARAM: &str = "twc_url";
pub const SKIP_CACHE_PARAM: &str = "twc_skip_cache";
pub const CACHE_EXPIRY_PARAM: &str = "twc_cache_expiry";
pub const TIMEOUT_PARAM: &str = "twc_timeout";

/// Validated request controls.
#[derive(Debug, Clone)]
pub struct ForwardParams {
    /// Target exactly as decoded from the query; this is what the key hashes.
    pub target: String,
    pub url: Url,
    pub skip_cache: bool,
    /// `None` means the stored entry never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub timeout: Duration,
}

/// Parse and validate the `twc_*` query parameters.
///
/// Checks run in a fixed order (target, expiry, timeout) and the first
/// failure is reported. A repeated parameter resolves to its first value.
pub fn parse_params(
    query: Option<&str>,
    limits: &ForwardConfig,
    now: DateTime<Utc>,
) -> Result<ForwardParams, PipelineError> {
    let pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = query
        .map(|q| form_urlencoded::parse(q.as_bytes()).collect())
        .unwrap_or_default();

    let target = match first_value(&pairs, TARGET_URL_PARAM) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Err(PipelineError::MissingTarget),
    };
    let url = Url::parse(&target).map_err(|_| PipelineError::InvalidTarget)?;

    let skip_cache = first_value(&pairs, SKIP_CACHE_PARAM) == Some("true");

    let expires_at = match non_empty(first_value(&pairs, CACHE_EXPIRY_PARAM)) {
        Some(raw) => Some(parse_expiry(raw, now)?),
        None => None,
    };

    let timeout = match non_empty(first_value(&pairs, TIMEOUT_PARAM)) {
        Some(raw) => parse_timeout(raw, limits)?,
        None => Duration::from_secs(limits.default_timeout_secs),
    };

    Ok(ForwardParams {
        target,
        url,
        skip_cache,
        expires_at,
        timeout,
    })
}

fn first_value<'a>(pairs: &'a [(Cow<'_, str>, Cow<'_, str>)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_ref())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn parse_expiry(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, PipelineError> {
    let secs: u64 = raw.parse().map_err(|_| PipelineError::InvalidExpiry)?;
    CachePolicy::expires_at(now, secs).ok_or(PipelineError::InvalidExpiry)
}

fn parse_timeout(raw: &str, limits: &ForwardConfig) -> Result<Duration, PipelineError> {
    let invalid = || PipelineError::InvalidTimeout {
        min: limits.min_timeout_secs,
        max: limits.max_timeout_secs,
    };
    let secs: u64 = raw.parse().map_err(|_| invalid())?;
    if !limits.timeout_in_range(secs) {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}
