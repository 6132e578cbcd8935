//! Request routing — map URL patterns and HTTP methods to operations.
//!
//! A [`Router`] dispatches incoming requests to the first registered [`Route`] whose
//! method and pattern match. Each route can declare the [`Operation`] it serves and a
//! stack of middleware wrapped around its handler, which is how output caching is
//! attached per operation:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rttp_outcache::{Response, Router, StatusCode};
//! use rttp_outcache::cache::{CacheOutput, CacheOutputOptions, CacheRegistry};
//! use rttp_outcache::context::{Context, Operation};
//!
//! let registry = Arc::new(CacheRegistry::new());
//! let mut router = Router::new();
//! router
//!     .get("/items", |_ctx: Context| async { Response::new(StatusCode::Ok).body("[]") })
//!     .operation(Operation::new("Items", "Get").bind_query("id"))
//!     .layer(CacheOutput::new(CacheOutputOptions::default().server_seconds(60), registry));
//! ```
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/users`             | `/users`                   | *(none)*                        |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                     |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, Operation, PathParams};
use crate::middleware::{BoxFuture, Endpoint, Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    // Matches any path that starts with the given prefix, e.g. `/files/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.clone(), path_seg.to_string()),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => path.strip_prefix(prefix.as_str()).map(|suffix| {
                let mut params = PathParams::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                params
            }),
        }
    }
}

/// A registered route: method + pattern, the operation it serves, its middleware
/// stack and the handler at the bottom of that stack.
///
/// Returned by the registration helpers on [`Router`] so the declaration can be
/// completed fluently.
pub struct Route {
    method: Method,
    pattern: Pattern,
    operation: Option<Arc<Operation>>,
    layers: Vec<MiddlewareHandler>,
    handler: Endpoint,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Endpoint) -> Self {
        Self {
            method,
            pattern: Pattern::parse(pattern),
            operation: None,
            layers: Vec::new(),
            handler,
        }
    }

    /// Declare the operation this route dispatches to.
    pub fn operation(&mut self, operation: Operation) -> &mut Self {
        self.operation = Some(Arc::new(operation));
        self
    }

    /// Wrap the handler in `middleware`. Layers added first run outermost.
    pub fn layer<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.layers.push(from_middleware(Arc::new(middleware)));
        self
    }

    // Returns `Some(params)` when both the HTTP method and path pattern match.
    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if &self.method == method {
            self.pattern.matches(path)
        } else {
            None
        }
    }
}

/// HTTP request router that dispatches requests to registered routes.
///
/// Routes are evaluated in registration order; when no route matches, a
/// `404 Not Found` response is returned.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> &mut Route {
        self.add_route(Method::Get, path, handler)
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> &mut Route {
        self.add_route(Method::Post, path, handler)
    }

    /// Register a handler for `PUT` requests matching `path`.
    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> &mut Route {
        self.add_route(Method::Put, path, handler)
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> &mut Route {
        self.add_route(Method::Delete, path, handler)
    }

    /// Register a handler for `PATCH` requests matching `path`.
    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> &mut Route {
        self.add_route(Method::Patch, path, handler)
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) -> &mut Route {
        let handler: Endpoint = Arc::new(move |ctx: Context| handler.call(ctx));
        self.routes.push(Route::new(method, path, handler));
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` through the first matching route's middleware stack.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(Context::new(request)).await
    }

    /// Like [`route`](Self::route) but starts from a caller-prepared context, so that an
    /// upstream authentication step can attach the caller identity.
    pub async fn dispatch(&self, ctx: Context) -> Response {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_owned();

        for route in &self.routes {
            if let Some(params) = route.matches(&method, &path) {
                let ctx = ctx.into_route(params, route.operation.clone());
                let next = Next::new(route.layers.clone(), route.handler.clone());
                return next.run(ctx).await;
            }
        }

        debug!(method = %method, path = %path, "no route matched");
        Response::new(StatusCode::NotFound)
    }
}
