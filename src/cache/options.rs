//! Per-operation output caching options.

use std::time::Duration;

use serde::Deserialize;

use super::policy::FixedLifetimes;

/// How one operation is cached.
///
/// Deserializable with every field optional, so a settings file only names
/// what differs from the defaults. All lifetimes are in seconds.
///
/// # Examples
///
/// ```
/// use rttp_outcache::cache::CacheOutputOptions;
///
/// let options = CacheOutputOptions::default()
///     .server_seconds(300)
///     .client_seconds(60)
///     .must_revalidate(true)
///     .include_header("X-Version");
/// assert_eq!(options.client_seconds, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOutputOptions {
    /// How long the response is kept by the server-side store.
    pub server_seconds: u64,
    /// `Cache-Control: max-age` advertised to clients.
    pub client_seconds: u64,
    /// `Cache-Control: s-maxage` advertised to shared caches.
    pub shared_seconds: Option<u64>,
    pub must_revalidate: bool,
    /// Emit `Cache-Control: no-cache` when no client lifetime applies.
    pub no_cache: bool,
    pub private: bool,
    /// Only cache responses for anonymous callers.
    pub anonymous_only: bool,
    /// Key on bound arguments only, ignoring the raw query string.
    pub exclude_query_from_key: bool,
    /// Name of a key generator bound in the registry.
    pub key_generator: Option<String>,
    /// Response header names captured with the body and replayed on hits.
    pub include_custom_headers: Vec<String>,
    /// Fixed media type, bypassing Accept negotiation.
    pub media_type: Option<String>,
}

impl Default for CacheOutputOptions {
    fn default() -> Self {
        Self {
            server_seconds: 0,
            client_seconds: 0,
            shared_seconds: None,
            must_revalidate: false,
            no_cache: false,
            private: false,
            anonymous_only: false,
            exclude_query_from_key: false,
            key_generator: None,
            include_custom_headers: Vec::new(),
            media_type: None,
        }
    }
}

impl CacheOutputOptions {
    #[must_use]
    pub fn server_seconds(mut self, seconds: u64) -> Self {
        self.server_seconds = seconds;
        self
    }

    #[must_use]
    pub fn client_seconds(mut self, seconds: u64) -> Self {
        self.client_seconds = seconds;
        self
    }

    #[must_use]
    pub fn shared_seconds(mut self, seconds: u64) -> Self {
        self.shared_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn must_revalidate(mut self, yes: bool) -> Self {
        self.must_revalidate = yes;
        self
    }

    #[must_use]
    pub fn no_cache(mut self, yes: bool) -> Self {
        self.no_cache = yes;
        self
    }

    #[must_use]
    pub fn private(mut self, yes: bool) -> Self {
        self.private = yes;
        self
    }

    #[must_use]
    pub fn anonymous_only(mut self, yes: bool) -> Self {
        self.anonymous_only = yes;
        self
    }

    #[must_use]
    pub fn exclude_query_from_key(mut self, yes: bool) -> Self {
        self.exclude_query_from_key = yes;
        self
    }

    #[must_use]
    pub fn key_generator(mut self, name: impl Into<String>) -> Self {
        self.key_generator = Some(name.into());
        self
    }

    #[must_use]
    pub fn include_header(mut self, name: impl Into<String>) -> Self {
        self.include_custom_headers.push(name.into());
        self
    }

    #[must_use]
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Whether `name` is one of the captured custom headers.
    pub fn captures_header(&self, name: &str) -> bool {
        self.include_custom_headers
            .iter()
            .any(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Fixed-lifetime policy matching these options.
    pub fn lifetimes(&self) -> FixedLifetimes {
        FixedLifetimes::new(
            Duration::from_secs(self.server_seconds),
            Duration::from_secs(self.client_seconds),
            self.shared_seconds.map(Duration::from_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_document() {
        let options: CacheOutputOptions = serde_json::from_str(
            r#"{"server_seconds": 120, "private": true, "include_custom_headers": ["X-Version"]}"#,
        )
        .unwrap();
        assert_eq!(options.server_seconds, 120);
        assert!(options.private);
        assert_eq!(options.client_seconds, 0);
        assert_eq!(options.shared_seconds, None);
        assert!(options.captures_header("x-version"));
        assert!(!options.captures_header("x-ver"));
    }

    #[test]
    fn lifetimes_follow_options() {
        let options = CacheOutputOptions::default()
            .server_seconds(10)
            .client_seconds(5)
            .shared_seconds(7);
        assert_eq!(
            options.lifetimes(),
            FixedLifetimes::new(
                Duration::from_secs(10),
                Duration::from_secs(5),
                Some(Duration::from_secs(7))
            )
        );
    }
}
