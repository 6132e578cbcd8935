//! Cache key derivation.
//!
//! A key has the shape `{base}-{arguments}:{media type}` where `base` is the
//! operation's group key and `arguments` the canonical `name=value` pairs joined
//! with `&`. The per-user generator inserts the caller's name before the media
//! type: `{base}-{arguments}:{user}:{media type}`.

use std::collections::BTreeSet;

use crate::context::{ArgValue, Context, Operation};
use crate::http::{Method, Request};

use super::error::CacheError;

/// Query parameter carrying a JSONP callback name. It never takes part in a key.
pub const JSONP_CALLBACK: &str = "callback";

/// Group ("base") key shared by every cached variant of `operation`.
///
/// # Examples
///
/// ```
/// use rttp_outcache::cache::base_key;
/// use rttp_outcache::context::Operation;
///
/// assert_eq!(base_key(&Operation::new("Items", "Get")), "items-get");
/// ```
pub fn base_key(operation: &Operation) -> String {
    format!("{}-{}", operation.type_name(), operation.name()).to_lowercase()
}

/// Derives the cache key of a request.
///
/// Implementations must be deterministic: identical inputs always yield the
/// identical key.
pub trait CacheKeyGenerator: Send + Sync {
    fn make_cache_key(
        &self,
        ctx: &Context,
        media_type: &str,
        exclude_query: bool,
    ) -> Result<String, CacheError>;
}

/// Keys on operation, arguments and negotiated media type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyGenerator;

impl DefaultKeyGenerator {
    pub const NAME: &'static str = "default";
}

impl CacheKeyGenerator for DefaultKeyGenerator {
    fn make_cache_key(
        &self,
        ctx: &Context,
        media_type: &str,
        exclude_query: bool,
    ) -> Result<String, CacheError> {
        let operation = ctx.operation().ok_or(CacheError::MissingOperation)?;
        let prefix = key_prefix(operation, ctx, exclude_query);
        Ok(format!("{prefix}:{media_type}"))
    }
}

/// Adds the authenticated caller's name to the key, so one user's response is
/// never served to another.
///
/// Only attach this generator to operations that already require an
/// authenticated caller; an anonymous caller yields
/// [`CacheError::Unauthenticated`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PerUserKeyGenerator;

impl PerUserKeyGenerator {
    pub const NAME: &'static str = "per-user";
}

impl CacheKeyGenerator for PerUserKeyGenerator {
    fn make_cache_key(
        &self,
        ctx: &Context,
        media_type: &str,
        exclude_query: bool,
    ) -> Result<String, CacheError> {
        let operation = ctx.operation().ok_or(CacheError::MissingOperation)?;
        let user = ctx
            .identity()
            .name()
            .ok_or(CacheError::Unauthenticated)?
            .to_lowercase();
        let prefix = key_prefix(operation, ctx, exclude_query);
        Ok(format!("{prefix}:{user}:{media_type}"))
    }
}

fn key_prefix(operation: &Operation, ctx: &Context, exclude_query: bool) -> String {
    let base = base_key(operation);
    let arguments = format_arguments(ctx, exclude_query);
    if arguments.is_empty() {
        base
    } else {
        format!("{base}-{arguments}")
    }
}

/// Canonical argument segment: bound arguments, plus the raw query pairs
/// unless `exclude_query`, deduplicated and sorted, joined with `&`.
pub(crate) fn format_arguments(ctx: &Context, exclude_query: bool) -> String {
    let mut pairs: BTreeSet<String> = ctx
        .arguments()
        .iter()
        .filter_map(|(name, value)| match value {
            ArgValue::Null => None,
            ArgValue::Single(v) => Some(format!("{name}={v}")),
            ArgValue::Many(values) => Some(format!("{name}={}", values.join(";"))),
        })
        .collect();

    if !exclude_query {
        let request = ctx.request();
        pairs.extend(
            request
                .query_pairs()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(JSONP_CALLBACK))
                .map(|(name, value)| format!("{name}={value}")),
        );

        if let Some(callback) = jsonp_callback(request) {
            pairs.remove(&format!("{JSONP_CALLBACK}={callback}"));
        }
    }

    pairs.into_iter().collect::<Vec<_>>().join("&")
}

// The callback name is extracted only to keep it out of the key; responses
// for different callback names share one entry.
fn jsonp_callback(request: &Request) -> Option<&str> {
    if request.method() != &Method::Get {
        return None;
    }
    request
        .query_pairs()
        .find(|(name, _)| name.eq_ignore_ascii_case(JSONP_CALLBACK))
        .map(|(_, value)| value)
        .filter(|value| !value.trim().is_empty())
}
