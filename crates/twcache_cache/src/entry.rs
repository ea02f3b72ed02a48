use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};

use crate::{
    key::CacheKey,
    policy::{CachePolicy, CachedHeaders},
};

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: StatusCode,
    pub headers: CachedHeaders,
    pub body: Bytes,
    pub created_at: DateTime<Utc>,
    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Build an entry from an upstream response, narrowing its headers.
    pub fn from_response(
        key: CacheKey,
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key,
            status,
            headers: CachePolicy::filter_for_cache(headers),
            body,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }
}
