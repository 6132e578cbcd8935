use thiserror::Error;

/// Errors raised by a [`CacheStore`](super::CacheStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend failed on `{key}`: {source}")]
    Backend {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("value stored under `{key}` does not decode as the requested type: {reason}")]
    Decode { key: String, reason: String },
}

impl StoreError {
    pub(crate) fn decode(key: &str, reason: impl ToString) -> Self {
        Self::Decode {
            key: key.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while deciding how to cache a request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A per-user key was requested for a caller that is not authenticated.
    /// The route must require authentication before the cache layer runs.
    #[error("per-user cache key requested for an unauthenticated caller")]
    Unauthenticated,

    #[error("no operation is bound to the request; cannot derive a cache key")]
    MissingOperation,
}
