//! Drops cached output after a successful write.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::{Context, Operation};
use crate::http::{Method, Response};
use crate::middleware::{BoxFuture, Middleware, Next};

use super::key::base_key;
use super::registry::CacheRegistry;

/// Invalidates the cached output of one or more operations once the wrapped
/// handler answers a non-`GET` request with a `2xx` status.
///
/// With no explicit targets the request's own operation is invalidated.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rttp_outcache::cache::{CacheRegistry, InvalidateCacheOutput};
/// use rttp_outcache::context::Operation;
///
/// let registry = Arc::new(CacheRegistry::new());
/// let layer = InvalidateCacheOutput::new(registry)
///     .target(Operation::new("Items", "Get"))
///     .target(Operation::new("Items", "All"));
/// ```
#[derive(Clone)]
pub struct InvalidateCacheOutput {
    registry: Arc<CacheRegistry>,
    groups: Arc<Vec<String>>,
}

impl InvalidateCacheOutput {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self {
            registry,
            groups: Arc::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn target(mut self, operation: Operation) -> Self {
        Arc::make_mut(&mut self.groups).push(base_key(&operation));
        self
    }

    async fn run(&self, ctx: Context, next: Next) -> Response {
        let is_write = ctx.request().method() != &Method::Get;
        let groups = if self.groups.is_empty() {
            ctx.operation().map(base_key).into_iter().collect()
        } else {
            self.groups.as_ref().clone()
        };

        let response = next.run(ctx).await;
        if !is_write || !response.status().is_success() {
            return response;
        }

        let store = self.registry.store();
        for group in &groups {
            match store.invalidate_group(group).await {
                Ok(()) => debug!(cache = "output", outcome = "invalidated", group = %group),
                Err(e) => {
                    warn!(cache = "output", group = %group, error = %e, "failed to invalidate cached output")
                }
            }
        }
        response
    }
}

impl Middleware for InvalidateCacheOutput {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move { this.run(ctx, next).await })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::context::PathParams;
    use crate::http::{Request, StatusCode};
    use crate::middleware::Endpoint;

    fn ctx(method: &str, operation: Operation) -> Context {
        let raw = format!("{method} /items HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        let request = Request::parse(raw.as_bytes()).unwrap().0;
        Context::for_route(request, PathParams::new(), Some(Arc::new(operation)))
    }

    fn answering(status: StatusCode) -> Endpoint {
        Arc::new(move |_ctx: Context| -> BoxFuture { Box::pin(async move { Response::new(status) }) })
    }

    async fn seeded(registry: &CacheRegistry) {
        let exp = OffsetDateTime::now_utc() + Duration::minutes(1);
        let store = registry.store();
        store.add("items-get", Bytes::new(), exp, None).await.unwrap();
        store
            .add("items-get-id=1:text/plain", Bytes::from_static(b"1"), exp, Some("items-get"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn successful_write_invalidates_targets() {
        let registry = Arc::new(CacheRegistry::new());
        seeded(&registry).await;
        let layer = InvalidateCacheOutput::new(Arc::clone(&registry)).target(Operation::new("Items", "Get"));

        let next = Next::new(Vec::new(), answering(StatusCode::Created));
        let response = layer.handle(ctx("POST", Operation::new("Items", "Create")), next).await;

        assert_eq!(response.status(), StatusCode::Created);
        assert!(!registry.store().contains("items-get-id=1:text/plain").await.unwrap());
    }

    #[tokio::test]
    async fn defaults_to_own_operation() {
        let registry = Arc::new(CacheRegistry::new());
        seeded(&registry).await;
        let layer = InvalidateCacheOutput::new(Arc::clone(&registry));

        let next = Next::new(Vec::new(), answering(StatusCode::NoContent));
        layer.handle(ctx("DELETE", Operation::new("Items", "Get")), next).await;
        assert!(!registry.store().contains("items-get-id=1:text/plain").await.unwrap());
    }

    #[tokio::test]
    async fn failed_or_read_requests_keep_entries() {
        let registry = Arc::new(CacheRegistry::new());
        seeded(&registry).await;
        let layer = InvalidateCacheOutput::new(Arc::clone(&registry)).target(Operation::new("Items", "Get"));

        let next = Next::new(Vec::new(), answering(StatusCode::Conflict));
        layer.handle(ctx("PUT", Operation::new("Items", "Update")), next).await;
        let next = Next::new(Vec::new(), answering(StatusCode::Ok));
        layer.handle(ctx("GET", Operation::new("Items", "Get")), next).await;

        assert!(registry.store().contains("items-get-id=1:text/plain").await.unwrap());
    }
}
