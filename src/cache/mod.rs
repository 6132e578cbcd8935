//! Response output caching.
//!
//! [`CacheOutput`] is a route layer that stores successful `GET` responses in
//! a [`CacheStore`] and answers repeated requests from it, including `304 Not
//! Modified` revalidation through entity tags. [`InvalidateCacheOutput`]
//! drops an operation's cached variants after a write.
//!
//! The pieces are pluggable through a shared [`CacheRegistry`]: the store
//! backend, named [`CacheKeyGenerator`]s and the media types accepted during
//! negotiation. Lifetimes come from an [`ExpirationPolicy`].

mod error;
mod interceptor;
mod invalidate;
mod key;
mod media;
mod options;
mod policy;
mod registry;
mod store;

pub use error::{CacheError, StoreError};
pub use interceptor::{
    CONTENT_TYPE_SUFFIX, CUSTOM_CONTENT_HEADERS_SUFFIX, CUSTOM_HEADERS_SUFFIX, CacheOutput,
    ETAG_SUFFIX, GENERATION_TIMESTAMP_SUFFIX, apply_cache_headers, is_caching_allowed,
};
pub use invalidate::InvalidateCacheOutput;
pub use key::{CacheKeyGenerator, DefaultKeyGenerator, JSONP_CALLBACK, PerUserKeyGenerator, base_key};
pub use media::{DEFAULT_MEDIA_TYPE, NegotiatedMediaType, negotiate as negotiate_media_type};
pub use options::CacheOutputOptions;
pub use policy::{CacheTime, DailyExpiry, ExpirationPolicy, FixedLifetimes};
pub use registry::{CacheRegistry, DEFAULT_PURGE_INTERVAL, KeyGeneratorFactory, StoreFactory};
pub use store::{CacheStore, CacheStoreExt, MemoryStore};
