use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Response header names allowed to survive into a stored entry.
pub const CACHEABLE_HEADERS: [&str; 7] = [
    "Content-Type",
    "Content-Encoding",
    "Cache-Control",
    "Expires",
    "ETag",
    "Last-Modified",
    "Vary",
];

pub struct CachePolicy;

impl CachePolicy {
    /// Allow-list spelling of `name`, if it is on the list.
    pub fn canonical_name(name: &str) -> Option<&'static str> {
        CACHEABLE_HEADERS
            .iter()
            .copied()
            .find(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    /// Narrow an upstream header set down to what may be persisted.
    pub fn filter_for_cache(headers: &HeaderMap) -> CachedHeaders {
        let mut out = BTreeMap::new();
        for name in CACHEABLE_HEADERS {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            if !values.is_empty() {
                out.insert(name.to_string(), values);
            }
        }
        CachedHeaders(out)
    }

    /// `now + ttl_secs`, or `None` when the result is not representable.
    pub fn expires_at(now: DateTime<Utc>, ttl_secs: u64) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(ttl_secs).ok()?;
        let delta = TimeDelta::try_seconds(secs)?;
        now.checked_add_signed(delta)
    }
}

/// Allow-listed response headers, name -> ordered values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedHeaders(BTreeMap<String, Vec<String>>);

impl CachedHeaders {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        let canonical = CachePolicy::canonical_name(name)?;
        self.0.get(canonical).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    /// Decode a stored blob. Names outside the allow-list are dropped so an
    /// old or hand-edited row cannot leak them into a replay.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let decoded: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)?;
        let filtered = decoded
            .into_iter()
            .filter_map(|(name, values)| {
                CachePolicy::canonical_name(&name).map(|c| (c.to_string(), values))
            })
            .collect();
        Ok(Self(filtered))
    }

    /// Append every stored value to `headers`.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for (name, values) in &self.0 {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(v) => {
                        headers.append(header_name.clone(), v);
                    }
                    Err(e) => {
                        warn!(
                            target: "twcache::cache",
                            header = %name,
                            error = %e,
                            "Skipping cached header value that is not a valid header"
                        );
                    }
                }
            }
        }
    }
}
