use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use twcache_cache::{
    CacheEntry, CacheError, CacheKey, CacheStore, MemoryCacheStore, SqliteCacheStore,
    SqliteOptions,
};
use twcache_config::TwcacheConfig;
use twcache_core::{AppContext, CACHE_HIT_HEADER, TwcResponse, handle};
use url::form_urlencoded;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Memory store that counts how often the pipeline touches it.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryCacheStore,
    lookups: AtomicUsize,
    upserts: AtomicUsize,
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn lookup(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(key, now).await
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(entry).await
    }
}

/// Store whose reads miss or fail and whose writes always fail.
struct BrokenStore {
    fail_reads: bool,
}

fn disk_error() -> CacheError {
    CacheError::CreateDir {
        path: "data".into(),
        source: std::io::Error::other("disk full"),
    }
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn lookup(&self, _: &CacheKey, _: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        if self.fail_reads {
            Err(disk_error())
        } else {
            Ok(None)
        }
    }

    async fn upsert(&self, _: &CacheEntry) -> Result<(), CacheError> {
        Err(disk_error())
    }
}

fn context(cfg: &TwcacheConfig, store: Arc<dyn CacheStore>) -> Arc<AppContext> {
    Arc::new(AppContext::new(cfg, store).unwrap())
}

fn memory_context() -> (Arc<AppContext>, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    (context(&TwcacheConfig::default(), store.clone()), store)
}

fn query(target: &str, extra: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("twc_url={encoded}{extra}")
}

fn request(method: Method, query: &str, auth: Option<&str>, body: &'static str) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(format!("/?{query}"));
    if let Some(key) = auth {
        builder = builder.header("x-twc-cache-auth", key);
    }
    builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
}

fn get(query: &str) -> Request<Full<Bytes>> {
    request(Method::GET, query, Some("testing"), "")
}

async fn body_of(resp: TwcResponse) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

fn is_hit(resp: &TwcResponse) -> bool {
    resp.headers().get(&CACHE_HIT_HEADER).is_some_and(|v| v == "true")
}

async fn mount_ok(server: &MockServer, body: &'static str, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/plain"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn second_identical_request_is_served_from_sqlite() {
    let server = MockServer::start().await;
    mount_ok(&server, "hello", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCacheStore::open(&SqliteOptions::new(dir.path().join("data/cache.db")))
        .await
        .unwrap();
    let ctx = context(&TwcacheConfig::default(), Arc::new(store));
    let q = query(&format!("{}/resource", server.uri()), "");

    let first = handle(&ctx, get(&q)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(!is_hit(&first));
    assert_eq!(body_of(first).await, Bytes::from_static(b"hello"));

    let second = handle(&ctx, get(&q)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(is_hit(&second));
    assert_eq!(second.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(body_of(second).await, Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn expired_entry_is_forwarded_again() {
    let server = MockServer::start().await;
    mount_ok(&server, "fresh", 2).await;

    let (ctx, _) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "&twc_cache_expiry=1");

    assert!(!is_hit(&handle(&ctx, get(&q)).await));
    assert!(is_hit(&handle(&ctx, get(&q)).await));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let third = handle(&ctx, get(&q)).await;
    assert_eq!(third.status(), StatusCode::OK);
    assert!(!is_hit(&third));
}

#[tokio::test]
async fn skip_cache_never_touches_the_store() {
    let server = MockServer::start().await;
    mount_ok(&server, "live", 2).await;

    let (ctx, store) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "&twc_skip_cache=true");

    for _ in 0..2 {
        let resp = handle(&ctx, get(&q)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!is_hit(&resp));
    }
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn out_of_range_timeout_is_rejected_before_forwarding() {
    let server = MockServer::start().await;
    mount_ok(&server, "unused", 0).await;

    let (ctx, store) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "&twc_timeout=3");

    let resp = handle(&ctx, get(&q)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_of(resp).await,
        Bytes::from_static(b"Invalid twc_timeout parameter (must be between 5 and 120 seconds)\n")
    );
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auth_is_checked_before_anything_else() {
    let server = MockServer::start().await;
    mount_ok(&server, "unused", 0).await;

    let (ctx, store) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "");

    let missing = handle(&ctx, request(Method::GET, &q, None, "")).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(missing).await, Bytes::from_static(b"Unauthorized\n"));

    let wrong = handle(&ctx, request(Method::GET, &q, Some("nope"), "")).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    // Bad params do not change the outcome without credentials.
    let both = handle(&ctx, request(Method::GET, "twc_timeout=1", None, "")).await;
    assert_eq!(both.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_and_invalid_targets_are_client_errors() {
    let (ctx, _) = memory_context();

    let resp = handle(&ctx, get("twc_skip_cache=true")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(resp).await, Bytes::from_static(b"Missing twc_url parameter\n"));

    let resp = handle(&ctx, get("twc_url=not-a-url")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(resp).await, Bytes::from_static(b"Invalid twc_url parameter\n"));

    let resp = handle(&ctx, get(&query("http://a/", "&twc_cache_expiry=-5"))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_of(resp).await,
        Bytes::from_static(b"Invalid twc_cache_expiry parameter\n")
    );
}

#[tokio::test]
async fn stored_headers_are_narrowed_but_the_first_response_is_not() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .insert_header("set-cookie", "session=1")
                .insert_header("x-upstream-trace", "abc")
                .set_body_raw("{}", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, store) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "");

    let miss = handle(&ctx, get(&q)).await;
    assert_eq!(miss.headers().get("set-cookie").unwrap(), "session=1");
    assert_eq!(miss.headers().get("x-upstream-trace").unwrap(), "abc");

    let hit = handle(&ctx, get(&q)).await;
    assert!(is_hit(&hit));
    assert_eq!(hit.headers().get("content-type").unwrap(), "application/json");
    assert_eq!(hit.headers().get("etag").unwrap(), "\"v1\"");
    assert!(hit.headers().get("set-cookie").is_none());
    assert!(hit.headers().get("x-upstream-trace").is_none());

    let key = CacheKey::derive("GET", &format!("{}/resource", server.uri()), b"");
    let stored = store.inner.lookup(&key, Utc::now()).await.unwrap().unwrap();
    let mut names: Vec<&str> = stored.headers.names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Content-Type", "ETag"]);
}

#[tokio::test]
async fn error_statuses_are_cached_too() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = memory_context();
    let q = query(&format!("{}/missing", server.uri()), "");

    assert_eq!(handle(&ctx, get(&q)).await.status(), StatusCode::NOT_FOUND);
    let hit = handle(&ctx, get(&q)).await;
    assert_eq!(hit.status(), StatusCode::NOT_FOUND);
    assert!(is_hit(&hit));
    assert_eq!(body_of(hit).await, Bytes::from_static(b"gone"));
}

#[tokio::test]
async fn method_and_body_are_part_of_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("posted"))
        .expect(2)
        .mount(&server)
        .await;
    mount_ok(&server, "got", 1).await;

    let (ctx, _) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "");

    let a = handle(&ctx, request(Method::POST, &q, Some("testing"), "a")).await;
    assert!(!is_hit(&a));
    let b = handle(&ctx, request(Method::POST, &q, Some("testing"), "b")).await;
    assert!(!is_hit(&b));
    let a_again = handle(&ctx, request(Method::POST, &q, Some("testing"), "a")).await;
    assert!(is_hit(&a_again));
    assert_eq!(body_of(a_again).await, Bytes::from_static(b"posted"));

    let g = handle(&ctx, get(&q)).await;
    assert!(!is_hit(&g));
    assert_eq!(body_of(g).await, Bytes::from_static(b"got"));
}

#[tokio::test]
async fn auth_header_is_not_forwarded() {
    let server = MockServer::start().await;
    mount_ok(&server, "ok", 1).await;

    let (ctx, _) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "");
    let mut req = get(&q);
    req.headers_mut().insert("x-client", "kept".parse().unwrap());
    handle(&ctx, req).await;

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("x-twc-cache-auth"));
    assert_eq!(received[0].headers.get("x-client").unwrap(), "kept");
}

#[tokio::test]
async fn unreachable_target_is_a_gateway_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (ctx, store) = memory_context();
    let resp = handle(&ctx, get(&query(&format!("http://{addr}/"), ""))).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = body_of(resp).await;
    assert!(body.starts_with(b"Error forwarding request:"));
    assert!(body.ends_with(b"\n"));
    assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timeout_override_extends_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;

    let mut cfg = TwcacheConfig::default();
    cfg.forward.default_timeout_secs = 5;
    let ctx = context(&cfg, Arc::new(MemoryCacheStore::new()));
    let target = format!("{}/resource", server.uri());

    let timed_out = handle(&ctx, get(&query(&target, "&twc_skip_cache=true"))).await;
    assert_eq!(timed_out.status(), StatusCode::BAD_GATEWAY);

    let resp = handle(&ctx, get(&query(&target, "&twc_skip_cache=true&twc_timeout=10"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_of(resp).await, Bytes::from_static(b"slow"));
}

#[tokio::test]
async fn concurrent_identical_misses_both_forward() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("same")
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (ctx, store) = memory_context();
    let q = query(&format!("{}/resource", server.uri()), "");

    let (a, b) = tokio::join!(handle(&ctx, get(&q)), handle(&ctx, get(&q)));
    assert!(!is_hit(&a));
    assert!(!is_hit(&b));
    assert_eq!(store.upserts.load(Ordering::SeqCst), 2);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn write_failures_do_not_reach_the_client() {
    let server = MockServer::start().await;
    mount_ok(&server, "served", 2).await;

    let ctx = context(
        &TwcacheConfig::default(),
        Arc::new(BrokenStore { fail_reads: false }),
    );
    let q = query(&format!("{}/resource", server.uri()), "");

    for _ in 0..2 {
        let resp = handle(&ctx, get(&q)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, Bytes::from_static(b"served"));
    }
}

#[tokio::test]
async fn read_failures_are_internal_errors() {
    let server = MockServer::start().await;
    mount_ok(&server, "unused", 0).await;

    let ctx = context(
        &TwcacheConfig::default(),
        Arc::new(BrokenStore { fail_reads: true }),
    );
    let resp = handle(&ctx, get(&query(&format!("{}/resource", server.uri()), ""))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_of(resp).await.starts_with(b"Error reading cache:"));
}

#[tokio::test]
async fn write_behind_persists_after_responding() {
    let server = MockServer::start().await;
    mount_ok(&server, "later", 1).await;

    let mut cfg = TwcacheConfig::default();
    cfg.cache.write_behind = true;
    let store = Arc::new(RecordingStore::default());
    let ctx = context(&cfg, store.clone());
    let q = query(&format!("{}/resource", server.uri()), "");

    assert_eq!(handle(&ctx, get(&q)).await.status(), StatusCode::OK);

    for _ in 0..50 {
        if !store.inner.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.inner.len(), 1);
    assert!(is_hit(&handle(&ctx, get(&q)).await));
}
