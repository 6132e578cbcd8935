//! Middleware pipeline — composable before/after request handler logic.
//!
//! Each route owns an ordered stack of middleware wrapped around its handler
//! (the *endpoint*). Every layer may inspect the request, short-circuit with
//! its own response, or decorate the response produced further down.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer, and eventually the endpoint.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`Endpoint`] — type-erased handler at the bottom of the stack.
//! - [`from_middleware`] — converts a [`Middleware`] into a [`MiddlewareHandler`].

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Response, context::Context};

/// Boxed response future returned by middleware and endpoints.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture + Send + Sync + 'static>;

/// The handler a middleware stack ultimately delegates to.
pub type Endpoint = Arc<dyn Fn(Context) -> BoxFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_outcache::cache::{CacheOutput, CacheOutputOptions, CacheRegistry};
/// use rttp_outcache::middleware::from_middleware;
///
/// let registry = Arc::new(CacheRegistry::new());
/// let layer = CacheOutput::new(CacheOutputOptions::default(), registry);
/// let handler = from_middleware(Arc::new(layer));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so a middleware can
/// forward a request at most once.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    endpoint: Endpoint,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Creates a `Next` positioned at the start of `middlewares`, ending in `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Endpoint) -> Self {
        Self {
            middlewares,
            endpoint,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain, or the endpoint once the
    /// chain is exhausted, and returns its response.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            (self.endpoint)(ctx).await
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future.
/// - Implementations **should not** hold locks across an `.await` point.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;
}
