//! Startup-time bindings for the cache layer: which store backs it and which
//! key generators are available by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use super::key::{CacheKeyGenerator, DefaultKeyGenerator, PerUserKeyGenerator};
use super::store::{CacheStore, MemoryStore};

/// Sweep interval of the fallback in-memory store.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub type StoreFactory = Arc<dyn Fn() -> Arc<dyn CacheStore> + Send + Sync>;
pub type KeyGeneratorFactory = Arc<dyn Fn() -> Arc<dyn CacheKeyGenerator> + Send + Sync>;

/// Registry of cache collaborators, built once at startup and shared by every
/// [`CacheOutput`](super::CacheOutput) layer through an `Arc`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rttp_outcache::cache::{CacheRegistry, MemoryStore, PerUserKeyGenerator};
///
/// let mut registry = CacheRegistry::new();
/// registry.register_store(|| Arc::new(MemoryStore::new()));
/// registry.register_key_generator("tenant", || Arc::new(PerUserKeyGenerator));
/// let registry = Arc::new(registry);
/// let _store = registry.store();
/// ```
pub struct CacheRegistry {
    store_factory: Option<StoreFactory>,
    store: OnceLock<Arc<dyn CacheStore>>,
    default_generator: Option<KeyGeneratorFactory>,
    generators: HashMap<String, KeyGeneratorFactory>,
    supported_media_types: Vec<String>,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self {
            store_factory: None,
            store: OnceLock::new(),
            default_generator: None,
            generators: HashMap::new(),
            supported_media_types: vec![
                "application/json".to_owned(),
                "text/json".to_owned(),
                "application/xml".to_owned(),
                "text/xml".to_owned(),
                "text/plain".to_owned(),
                "text/html".to_owned(),
            ],
        }
    }
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the store factory. The first registration wins; later ones are
    /// ignored with a warning.
    pub fn register_store<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn CacheStore> + Send + Sync + 'static,
    {
        if self.store_factory.is_some() {
            warn!(cache = "registry", "cache store already registered, ignoring");
        } else {
            self.store_factory = Some(Arc::new(factory));
        }
        self
    }

    /// Binds the generator used when an operation names none.
    pub fn register_default_key_generator<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn CacheKeyGenerator> + Send + Sync + 'static,
    {
        self.default_generator = Some(Arc::new(factory));
        self
    }

    pub fn register_key_generator<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn CacheKeyGenerator> + Send + Sync + 'static,
    {
        self.generators.insert(name.into(), Arc::new(factory));
        self
    }

    /// Replaces the media types accepted during negotiation.
    pub fn set_supported_media_types<I, S>(&mut self, media_types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_media_types = media_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn supported_media_types(&self) -> &[String] {
        &self.supported_media_types
    }

    /// The shared store, built on first use. Falls back to a [`MemoryStore`]
    /// when none was registered; inside a tokio runtime the fallback store
    /// is swept every [`DEFAULT_PURGE_INTERVAL`].
    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(self.store.get_or_init(|| match &self.store_factory {
            Some(factory) => factory(),
            None => {
                debug!(cache = "registry", "no cache store registered, using in-memory store");
                let store = Arc::new(MemoryStore::new());
                if tokio::runtime::Handle::try_current().is_ok() {
                    store.spawn_purger(DEFAULT_PURGE_INTERVAL);
                }
                store as Arc<dyn CacheStore>
            }
        }))
    }

    /// Resolves a key generator by name.
    ///
    /// Named bindings are tried first, then the built-in names, then the
    /// default binding. An unknown name logs a warning and resolves to the
    /// default.
    pub fn key_generator(&self, name: Option<&str>) -> Arc<dyn CacheKeyGenerator> {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            if let Some(factory) = self.generators.get(name) {
                return factory();
            }
            match name {
                DefaultKeyGenerator::NAME => return Arc::new(DefaultKeyGenerator),
                PerUserKeyGenerator::NAME => return Arc::new(PerUserKeyGenerator),
                unknown => {
                    warn!(cache = "registry", generator = unknown, "unknown key generator, using default");
                }
            }
        }
        match &self.default_generator {
            Some(factory) => factory(),
            None => Arc::new(DefaultKeyGenerator),
        }
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("store_registered", &self.store_factory.is_some())
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("supported_media_types", &self.supported_media_types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use time::OffsetDateTime;

    use super::*;
    use crate::cache::CacheError;
    use crate::context::{Context, Operation, PathParams};
    use crate::http::Request;

    struct Fixed(&'static str);

    impl CacheKeyGenerator for Fixed {
        fn make_cache_key(&self, _: &Context, _: &str, _: bool) -> Result<String, CacheError> {
            Ok(self.0.to_owned())
        }
    }

    fn ctx() -> Context {
        let request = Request::parse(b"GET /items HTTP/1.1\r\n\r\n").unwrap().0;
        Context::for_route(
            request,
            PathParams::new(),
            Some(Arc::new(Operation::new("Items", "All"))),
        )
    }

    fn key_of(registry: &CacheRegistry, name: Option<&str>) -> String {
        registry
            .key_generator(name)
            .make_cache_key(&ctx(), "text/plain", false)
            .unwrap()
    }

    #[test]
    fn generator_resolution_order() {
        let mut registry = CacheRegistry::new();
        assert_eq!(key_of(&registry, None), "items-all:text/plain");

        registry.register_default_key_generator(|| Arc::new(Fixed("fallback")));
        registry.register_key_generator("fixed", || Arc::new(Fixed("named")));

        assert_eq!(key_of(&registry, Some("fixed")), "named");
        assert_eq!(key_of(&registry, Some("default")), "items-all:text/plain");
        assert_eq!(key_of(&registry, Some("nope")), "fallback");
        assert_eq!(key_of(&registry, None), "fallback");
    }

    #[test]
    fn named_binding_shadows_builtin() {
        let mut registry = CacheRegistry::new();
        registry.register_key_generator("per-user", || Arc::new(Fixed("mine")));
        assert_eq!(key_of(&registry, Some("per-user")), "mine");
    }

    #[tokio::test]
    async fn store_is_built_once_and_first_registration_wins() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let mut registry = CacheRegistry::new();
        registry.register_store(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MemoryStore::new())
        });
        registry.register_store(|| panic!("second store must be ignored"));

        let exp = OffsetDateTime::now_utc() + time::Duration::minutes(1);
        registry.store().add("k", Bytes::from_static(b"v"), exp, None).await.unwrap();
        assert!(registry.store().contains("k").await.unwrap());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fallback_store_builds_outside_a_runtime() {
        let registry = CacheRegistry::new();
        let first = registry.store();
        let second = registry.store();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn supported_media_types_are_replaceable() {
        let mut registry = CacheRegistry::new();
        assert!(registry.supported_media_types().iter().any(|m| m == "application/json"));
        registry.set_supported_media_types(["text/csv"]);
        assert_eq!(registry.supported_media_types(), ["text/csv".to_owned()]);
    }
}
