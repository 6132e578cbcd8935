//! The output-caching middleware.
//!
//! For a cacheable request the layer derives a key, then either answers from
//! the store (a `304` when the client's entity tag still matches, the stored
//! body otherwise) or runs the handler and stores its successful response.
//!
//! A stored response is a set of entries sharing the primary key: the body
//! under the key itself and one sibling per attribute, named with the
//! `:response-*` suffixes below. Every entry belongs to the operation's group
//! so invalidating the group drops all of them.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::http::{Headers, Method, Response, StatusCode};
use crate::middleware::{BoxFuture, Middleware, Next};

use super::error::StoreError;
use super::key::base_key;
use super::media::{self, NegotiatedMediaType};
use super::options::CacheOutputOptions;
use super::policy::{CacheTime, ExpirationPolicy};
use super::registry::CacheRegistry;
use super::store::{CacheStore, CacheStoreExt};

pub const CONTENT_TYPE_SUFFIX: &str = ":response-ct";
pub const ETAG_SUFFIX: &str = ":response-etag";
pub const GENERATION_TIMESTAMP_SUFFIX: &str = ":response-generationtimestamp";
pub const CUSTOM_HEADERS_SUFFIX: &str = ":response-custom-headers";
pub const CUSTOM_CONTENT_HEADERS_SUFFIX: &str = ":response-custom-content-headers";

/// Output caching for one route.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rttp_outcache::cache::{CacheOutput, CacheOutputOptions, CacheRegistry};
/// use rttp_outcache::context::Operation;
/// use rttp_outcache::{Response, Router, StatusCode};
///
/// let registry = Arc::new(CacheRegistry::new());
/// let mut router = Router::new();
/// router
///     .get("/items", |_ctx: rttp_outcache::context::Context| async {
///         Response::new(StatusCode::Ok).body("[]")
///     })
///     .operation(Operation::new("Items", "All"))
///     .layer(CacheOutput::new(
///         CacheOutputOptions::default().server_seconds(60).client_seconds(60),
///         registry,
///     ));
/// ```
#[derive(Clone)]
pub struct CacheOutput {
    options: Arc<CacheOutputOptions>,
    registry: Arc<CacheRegistry>,
    policy: Arc<dyn ExpirationPolicy>,
}

impl CacheOutput {
    /// Caches with the fixed lifetimes named in `options`.
    pub fn new(options: CacheOutputOptions, registry: Arc<CacheRegistry>) -> Self {
        let policy = Arc::new(options.lifetimes());
        Self {
            options: Arc::new(options),
            registry,
            policy,
        }
    }

    /// Replaces the expiration policy, e.g. with a [`DailyExpiry`](super::DailyExpiry).
    #[must_use]
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: ExpirationPolicy + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    pub fn options(&self) -> &CacheOutputOptions {
        &self.options
    }

    async fn run(&self, mut ctx: Context, next: Next) -> Response {
        if !is_caching_allowed(&ctx, self.options.anonymous_only) {
            return next.run(ctx).await;
        }
        let Some(group) = ctx.operation().map(base_key) else {
            return next.run(ctx).await;
        };

        let store = self.registry.store();
        let generator = self
            .registry
            .key_generator(self.options.key_generator.as_deref());
        let media_type = media::negotiate(
            self.options.media_type.as_deref(),
            ctx.request().headers().get("Accept"),
            self.registry.supported_media_types(),
        );

        let key = match generator.make_cache_key(
            &ctx,
            &media_type,
            self.options.exclude_query_from_key,
        ) {
            Ok(key) => key,
            Err(e) => {
                error!(cache = "output", group = %group, error = %e, "failed to derive cache key");
                return Response::new(StatusCode::InternalServerError);
            }
        };
        ctx.extensions_mut()
            .insert(NegotiatedMediaType(media_type.clone()));

        let now = OffsetDateTime::now_utc();
        let cache_time = self.policy.evaluate(now);

        if let Some(response) = self
            .try_serve(store.as_ref(), &ctx, &key, &media_type, &cache_time)
            .await
        {
            return response;
        }
        debug!(cache = "output", outcome = "miss", key = %key);

        let mut response = next.run(ctx).await;
        if !response.status().is_success() {
            return response;
        }

        let fresh = cache_time.absolute_expiration > now;
        if fresh {
            let pending = Pending {
                group: &group,
                key: &key,
                media_type: &media_type,
                now,
                cache_time,
            };
            self.store_response(store.as_ref(), &pending, &mut response).await;
        }
        apply_cache_headers(&mut response, &cache_time, &self.options, fresh.then_some(now));
        response
    }

    async fn try_serve(
        &self,
        store: &dyn CacheStore,
        ctx: &Context,
        key: &str,
        media_type: &str,
        cache_time: &CacheTime,
    ) -> Option<Response> {
        let body = match store.get(key).await {
            Ok(body) => body?,
            Err(e) => {
                warn!(cache = "output", key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let etag = read_string(store, &sibling(key, ETAG_SUFFIX)).await;
        let custom = read_headers(store, &sibling(key, CUSTOM_HEADERS_SUFFIX)).await;

        if let Some(etag) = &etag {
            let if_none_match = ctx.request().headers().get("If-None-Match");
            if if_none_match.is_some_and(|header| etag_matches(header, etag)) {
                debug!(cache = "output", outcome = "not-modified", key);
                let mut response = Response::new(StatusCode::NotModified);
                copy_headers(&mut response, &custom);
                response.set_header("ETag", quote(etag));
                apply_cache_headers(&mut response, cache_time, &self.options, None);
                return Some(response);
            }
        }

        let content_type = read_string(store, &sibling(key, CONTENT_TYPE_SUFFIX))
            .await
            .unwrap_or_else(|| media_type.to_owned());
        let content_headers =
            read_headers(store, &sibling(key, CUSTOM_CONTENT_HEADERS_SUFFIX)).await;
        let generated = read_string(store, &sibling(key, GENERATION_TIMESTAMP_SUFFIX))
            .await
            .and_then(|ts| OffsetDateTime::parse(&ts, &Rfc3339).ok());

        debug!(cache = "output", outcome = "hit", key);
        let mut response = Response::new(StatusCode::Ok).body_bytes(body);
        response.set_header("Content-Type", content_type);
        copy_headers(&mut response, &custom);
        copy_headers(&mut response, &content_headers);
        if let Some(etag) = &etag {
            response.set_header("ETag", quote(etag));
        }
        apply_cache_headers(&mut response, cache_time, &self.options, generated);
        Some(response)
    }

    /// Persists a fresh response and tags it with its new ETag. Returns
    /// whether the response was stored.
    async fn store_response(
        &self,
        store: &dyn CacheStore,
        pending: &Pending<'_>,
        response: &mut Response,
    ) -> bool {
        let key = pending.key;
        match store.contains(key).await {
            Ok(false) => {}
            Ok(true) => return false,
            Err(e) => {
                warn!(cache = "output", key, error = %e, "cache lookup failed, not storing");
                return false;
            }
        }

        let etag = Uuid::new_v4().to_string();
        match self.write_entries(store, pending, &etag, response).await {
            Ok(()) => {
                debug!(cache = "output", outcome = "stored", key, group = pending.group);
                response.set_header("ETag", quote(&etag));
                true
            }
            Err(e) => {
                warn!(cache = "output", key, error = %e, "failed to store response");
                false
            }
        }
    }

    async fn write_entries(
        &self,
        store: &dyn CacheStore,
        pending: &Pending<'_>,
        etag: &str,
        response: &Response,
    ) -> Result<(), StoreError> {
        let Pending {
            group,
            key,
            media_type,
            now,
            cache_time,
        } = *pending;
        let expires_at = cache_time.absolute_expiration;

        if !store.contains(group).await? {
            store.add(group, Bytes::new(), expires_at, None).await?;
        }

        let content_type = response.headers().get("Content-Type").unwrap_or(media_type);
        store
            .add_string(&sibling(key, CONTENT_TYPE_SUFFIX), content_type, expires_at, Some(group))
            .await?;
        store
            .add_string(&sibling(key, ETAG_SUFFIX), etag, expires_at, Some(group))
            .await?;
        let generated = now
            .format(&Rfc3339)
            .map_err(|e| StoreError::decode(key, e))?;
        store
            .add_string(
                &sibling(key, GENERATION_TIMESTAMP_SUFFIX),
                &generated,
                expires_at,
                Some(group),
            )
            .await?;

        let captured = response
            .headers()
            .filter(|name| self.options.captures_header(name) && !is_excluded(name));
        let content = captured.filter(is_content_header);
        let custom = captured.filter(|name| !is_content_header(name));
        if !custom.is_empty() {
            store
                .add_json(&sibling(key, CUSTOM_HEADERS_SUFFIX), &custom, expires_at, Some(group))
                .await?;
        }
        if !content.is_empty() {
            store
                .add_json(
                    &sibling(key, CUSTOM_CONTENT_HEADERS_SUFFIX),
                    &content,
                    expires_at,
                    Some(group),
                )
                .await?;
        }

        store
            .add(key, response.content().clone(), expires_at, Some(group))
            .await
    }
}

/// A handler response on its way into the store.
struct Pending<'a> {
    group: &'a str,
    key: &'a str,
    media_type: &'a str,
    now: OffsetDateTime,
    cache_time: CacheTime,
}

impl Middleware for CacheOutput {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move { this.run(ctx, next).await })
    }
}

/// Whether the request may be answered from, or stored into, the cache.
///
/// Only `GET` requests bound to an operation that does not opt out qualify.
/// With `anonymous_only`, authenticated callers are never cached.
pub fn is_caching_allowed(ctx: &Context, anonymous_only: bool) -> bool {
    if ctx.request().method() != &Method::Get {
        return false;
    }
    match ctx.operation() {
        Some(operation) if !operation.ignores_cache() => {}
        _ => return false,
    }
    !(anonymous_only && ctx.identity().is_authenticated())
}

/// Writes `Cache-Control`, `Pragma` and `Last-Modified` for the given lifetimes.
pub fn apply_cache_headers(
    response: &mut Response,
    cache_time: &CacheTime,
    options: &CacheOutputOptions,
    generated: Option<OffsetDateTime>,
) {
    let max_age = cache_time.client_lifetime.as_secs();
    if max_age > 0 || options.must_revalidate || options.private {
        let mut directives = format!("max-age={max_age}");
        if let Some(shared) = cache_time.shared_lifetime {
            directives.push_str(&format!(", s-maxage={}", shared.as_secs()));
        }
        if options.must_revalidate {
            directives.push_str(", must-revalidate");
        }
        if options.private {
            directives.push_str(", private");
        }
        response.set_header("Cache-Control", directives);
    } else if options.no_cache {
        response.set_header("Cache-Control", "no-cache");
        response.set_header("Pragma", "no-cache");
    }

    if let Some(generated) = generated {
        if !response.content().is_empty() {
            let last_modified = httpdate::fmt_http_date(SystemTime::from(generated));
            response.set_header("Last-Modified", last_modified);
        }
    }
}

fn sibling(key: &str, suffix: &str) -> String {
    format!("{key}{suffix}")
}

fn quote(etag: &str) -> String {
    format!("\"{etag}\"")
}

/// True when any tag listed in an `If-None-Match` header equals `etag`.
/// Weak validators compare by their opaque tag.
fn etag_matches(header: &str, etag: &str) -> bool {
    header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
        candidate.trim_matches('"') == etag
    })
}

fn is_content_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("content-") || matches!(lower.as_str(), "expires" | "last-modified" | "allow")
}

// Headers the cache manages itself are never captured.
fn is_excluded(name: &str) -> bool {
    ["content-length", "content-type", "etag", "cache-control", "pragma"]
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

fn copy_headers(response: &mut Response, headers: &Headers) {
    for (name, value) in headers.iter() {
        response.add_header(name, value);
    }
}

async fn read_string(store: &dyn CacheStore, key: &str) -> Option<String> {
    match store.get_string(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(cache = "output", key, error = %e, "ignoring unreadable cache entry");
            None
        }
    }
}

async fn read_headers(store: &dyn CacheStore, key: &str) -> Headers {
    match store.get_json::<Headers>(key).await {
        Ok(headers) => headers.unwrap_or_default(),
        Err(e) => {
            warn!(cache = "output", key, error = %e, "ignoring unreadable cache entry");
            Headers::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::{FixedLifetimes, MemoryStore};
    use crate::context::{Identity, Operation, PathParams};
    use crate::http::Request;
    use crate::middleware::Endpoint;

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn get(target: &str, extra: &str) -> Context {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n{extra}\r\n");
        Context::for_route(
            request(&raw),
            PathParams::new(),
            Some(Arc::new(Operation::new("Items", "Get").bind_query("id"))),
        )
    }

    fn counting_endpoint(calls: Arc<AtomicUsize>) -> Endpoint {
        Arc::new(move |_ctx: Context| -> BoxFuture {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Response::new(StatusCode::Ok)
                    .header("Content-Type", "application/json")
                    .header("X-Version", "7")
                    .header("Content-Language", "en")
                    .body(r#"{"id":5}"#)
            })
        })
    }

    async fn call(layer: &CacheOutput, ctx: Context, endpoint: &Endpoint) -> Response {
        layer.handle(ctx, Next::new(Vec::new(), Arc::clone(endpoint))).await
    }

    fn layer(options: CacheOutputOptions) -> (CacheOutput, Arc<CacheRegistry>) {
        let registry = Arc::new(CacheRegistry::new());
        (CacheOutput::new(options, Arc::clone(&registry)), registry)
    }

    fn options() -> CacheOutputOptions {
        CacheOutputOptions::default()
            .server_seconds(60)
            .client_seconds(30)
            .include_header("X-Version")
            .include_header("Content-Language")
    }

    #[tokio::test]
    async fn miss_stores_then_hit_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let (layer, registry) = layer(options());
        let accept = "Accept: application/json\r\n";

        let first = call(&layer, get("/items?id=5", accept), &endpoint).await;
        assert_eq!(first.status(), StatusCode::Ok);
        assert!(first.headers().get("ETag").is_some());
        assert_eq!(first.headers().get("Cache-Control"), Some("max-age=30"));
        assert!(first.headers().get("Last-Modified").is_some());

        let store = registry.store();
        let key = "items-get-id=5:application/json";
        assert!(store.contains(key).await.unwrap());
        assert!(store.contains(&sibling(key, ETAG_SUFFIX)).await.unwrap());

        let second = call(&layer, get("/items?id=5", accept), &endpoint).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.content(), first.content());
        assert_eq!(second.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(second.headers().get("X-Version"), Some("7"));
        assert_eq!(second.headers().get("Content-Language"), Some("en"));
        assert_eq!(second.headers().get("ETag"), first.headers().get("ETag"));
        assert_eq!(second.headers().get("Cache-Control"), Some("max-age=30"));
    }

    #[tokio::test]
    async fn matching_if_none_match_yields_not_modified() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let (layer, _) = layer(options());

        let first = call(&layer, get("/items?id=5", ""), &endpoint).await;
        let etag = first.headers().get("ETag").unwrap().to_owned();

        let conditional = format!("If-None-Match: W/{etag}\r\n");
        let second = call(&layer, get("/items?id=5", &conditional), &endpoint).await;
        assert_eq!(second.status(), StatusCode::NotModified);
        assert!(second.content().is_empty());
        assert_eq!(second.headers().get("ETag"), Some(etag.as_str()));
        assert_eq!(second.headers().get("X-Version"), Some("7"));
        assert_eq!(second.headers().get("Cache-Control"), Some("max-age=30"));
        assert!(second.headers().get("Last-Modified").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stale = call(&layer, get("/items?id=5", "If-None-Match: \"other\"\r\n"), &endpoint).await;
        assert_eq!(stale.status(), StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_server_lifetime_never_stores() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let (layer, _) = layer(CacheOutputOptions::default().client_seconds(10));

        let first = call(&layer, get("/items?id=1", ""), &endpoint).await;
        assert!(first.headers().get("ETag").is_none());
        assert_eq!(first.headers().get("Cache-Control"), Some("max-age=10"));
        call(&layer, get("/items?id=1", ""), &endpoint).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_responses_pass_through_unstored() {
        let endpoint: Endpoint = Arc::new(|_ctx: Context| -> BoxFuture {
            Box::pin(async { Response::new(StatusCode::NotFound) })
        });
        let (layer, registry) = layer(options());
        let response = call(&layer, get("/items?id=9", ""), &endpoint).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert!(response.headers().get("Cache-Control").is_none());
        let key = "items-get-id=9:application/json; charset=utf-8";
        assert!(!registry.store().contains(key).await.unwrap());
    }

    #[tokio::test]
    async fn anonymous_only_bypasses_authenticated_callers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let (layer, registry) = layer(options().anonymous_only(true));

        let ctx = || get("/items?id=5", "").with_identity(Identity::authenticated("alice"));
        let response = call(&layer, ctx(), &endpoint).await;
        call(&layer, ctx(), &endpoint).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(response.headers().get("Cache-Control").is_none());
        assert!(!registry.store().contains("items-get").await.unwrap());
    }

    #[tokio::test]
    async fn per_user_generator_rejects_anonymous_with_500() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let (layer, _) = layer(options().key_generator("per-user"));
        let response = call(&layer, get("/items?id=5", ""), &endpoint).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn negotiated_media_type_reaches_handler() {
        let endpoint: Endpoint = Arc::new(|ctx: Context| -> BoxFuture {
            let media = ctx
                .extensions()
                .get::<NegotiatedMediaType>()
                .map(|m| m.0.clone())
                .unwrap_or_default();
            Box::pin(async move { Response::new(StatusCode::Ok).body(media) })
        });
        let (layer, _) = layer(options());
        let response = call(&layer, get("/items", "Accept: text/html;q=0.8\r\n"), &endpoint).await;
        assert_eq!(response.content().as_ref(), b"text/html");
    }

    #[tokio::test]
    async fn existing_entry_is_not_overwritten() {
        let registry = Arc::new(CacheRegistry::new());
        let store = registry.store();
        let exp = OffsetDateTime::now_utc() + time::Duration::minutes(1);
        let key = "items-get-id=5:application/json; charset=utf-8";
        store.add(key, Bytes::from_static(b"first"), exp, None).await.unwrap();

        let mut response = Response::new(StatusCode::Ok).body("second");
        let layer = CacheOutput::new(options(), Arc::clone(&registry));
        let now = OffsetDateTime::now_utc();
        let pending = Pending {
            group: "items-get",
            key,
            media_type: "text/plain",
            now,
            cache_time: layer.policy.evaluate(now),
        };
        let stored = layer.store_response(store.as_ref(), &pending, &mut response).await;
        assert!(!stored);
        assert!(response.headers().get("ETag").is_none());
        assert_eq!(store.get(key).await.unwrap(), Some(Bytes::from_static(b"first")));
    }

    /// Reads always miss and writes always fail.
    struct FailingStore;

    #[async_trait::async_trait]
    impl CacheStore for FailingStore {
        async fn contains(&self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            Ok(None)
        }

        async fn add(
            &self,
            _key: &str,
            _value: Bytes,
            _expires_at: OffsetDateTime,
            _group: Option<&str>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_owned()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn fresh_miss_sets_last_modified_when_store_write_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let mut registry = CacheRegistry::new();
        registry.register_store(|| Arc::new(FailingStore));
        let layer = CacheOutput::new(options(), Arc::new(registry));

        let response = call(&layer, get("/items?id=5", ""), &endpoint).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().get("ETag").is_none());
        assert_eq!(response.headers().get("Cache-Control"), Some("max-age=30"));
        assert!(response.headers().get("Last-Modified").is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_policy_drives_lifetimes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = counting_endpoint(Arc::clone(&calls));
        let registry = Arc::new(CacheRegistry::new());
        let layer = CacheOutput::new(CacheOutputOptions::default(), registry).with_policy(
            FixedLifetimes::new(Duration::from_secs(60), Duration::from_secs(5), Some(Duration::from_secs(9))),
        );
        let response = call(&layer, get("/items", ""), &endpoint).await;
        assert_eq!(response.headers().get("Cache-Control"), Some("max-age=5, s-maxage=9"));
        call(&layer, get("/items", ""), &endpoint).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreadable_sibling_is_ignored() {
        let store = MemoryStore::new();
        let exp = OffsetDateTime::now_utc() + time::Duration::minutes(1);
        store.add("k:response-custom-headers", Bytes::from_static(b"not json"), exp, None).await.unwrap();
        assert!(read_headers(&store, "k:response-custom-headers").await.is_empty());
    }

    #[test]
    fn cache_control_variants() {
        let now = OffsetDateTime::now_utc();
        let lifetimes = |client: u64| CacheTime {
            client_lifetime: Duration::from_secs(client),
            shared_lifetime: None,
            absolute_expiration: now,
        };

        let mut response = Response::new(StatusCode::Ok);
        let opts = CacheOutputOptions::default().must_revalidate(true).private(true);
        apply_cache_headers(&mut response, &lifetimes(0), &opts, None);
        assert_eq!(
            response.headers().get("Cache-Control"),
            Some("max-age=0, must-revalidate, private")
        );

        let mut response = Response::new(StatusCode::Ok);
        apply_cache_headers(&mut response, &lifetimes(0), &CacheOutputOptions::default().no_cache(true), None);
        assert_eq!(response.headers().get("Cache-Control"), Some("no-cache"));
        assert_eq!(response.headers().get("Pragma"), Some("no-cache"));

        let mut response = Response::new(StatusCode::Ok);
        apply_cache_headers(&mut response, &lifetimes(0), &CacheOutputOptions::default(), Some(now));
        assert!(response.headers().get("Cache-Control").is_none());
        assert!(response.headers().get("Last-Modified").is_none());
    }

    #[test]
    fn caching_eligibility() {
        assert!(is_caching_allowed(&get("/items", ""), false));

        let post = Context::for_route(
            request("POST /items HTTP/1.1\r\nContent-Length: 0\r\n\r\n"),
            PathParams::new(),
            Some(Arc::new(Operation::new("Items", "Create"))),
        );
        assert!(!is_caching_allowed(&post, false));

        let ignored = Context::for_route(
            request("GET /items HTTP/1.1\r\n\r\n"),
            PathParams::new(),
            Some(Arc::new(Operation::new("Items", "Live").ignore_cache())),
        );
        assert!(!is_caching_allowed(&ignored, false));

        let unbound = Context::new(request("GET /items HTTP/1.1\r\n\r\n"));
        assert!(!is_caching_allowed(&unbound, false));

        let user = get("/items", "").with_identity(Identity::authenticated("bob"));
        assert!(is_caching_allowed(&user, false));
        assert!(!is_caching_allowed(&user, true));
    }

    #[test]
    fn etag_comparison() {
        assert!(etag_matches("\"abc\"", "abc"));
        assert!(etag_matches("W/\"abc\"", "abc"));
        assert!(etag_matches("\"x\", \"abc\"", "abc"));
        assert!(!etag_matches("\"abcd\"", "abc"));
    }
}
