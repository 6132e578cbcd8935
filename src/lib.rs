//! # rttp-outcache
//!
//! Response output caching for the rttp async HTTP/1.1 framework.
//!
//! Routes declare the [`Operation`](context::Operation) they implement and a
//! stack of layers. Adding a [`CacheOutput`](cache::CacheOutput) layer stores
//! successful `GET` responses, serves repeated requests from the store,
//! answers `If-None-Match` revalidation with `304 Not Modified` and writes the
//! `Cache-Control` headers clients and shared caches act on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rttp_outcache::cache::{CacheOutput, CacheOutputOptions, CacheRegistry};
//! use rttp_outcache::context::{Context, Operation};
//! use rttp_outcache::{Request, Response, Router, StatusCode};
//!
//! # async fn demo(request: Request) {
//! let registry = Arc::new(CacheRegistry::new());
//! let mut router = Router::new();
//! router
//!     .get("/items/:id", |ctx: Context| async move {
//!         let id = ctx.params().get("id").unwrap_or_default().to_owned();
//!         Response::new(StatusCode::Ok)
//!             .header("Content-Type", "application/json")
//!             .body(format!(r#"{{"id":"{id}"}}"#))
//!     })
//!     .operation(Operation::new("Items", "Get"))
//!     .layer(CacheOutput::new(
//!         CacheOutputOptions::default().server_seconds(300).client_seconds(60),
//!         Arc::clone(&registry),
//!     ));
//!
//! let response = router.route(request).await;
//! # let _ = response;
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod settings;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
