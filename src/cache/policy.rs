//! Expiration policies: how long a response lives in the server cache and
//! what lifetimes are advertised to clients and shared caches.

use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Lifetimes computed for one evaluation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTime {
    /// `max-age` advertised to the client. Zero disables client caching.
    pub client_lifetime: Duration,
    /// `s-maxage` advertised to shared caches, when configured.
    pub shared_lifetime: Option<Duration>,
    /// Instant after which the server-side entry is stale.
    pub absolute_expiration: OffsetDateTime,
}

/// Computes [`CacheTime`] for an evaluation instant.
///
/// Implementations are pure functions of `now` and their static
/// configuration, so they can be evaluated any number of times.
pub trait ExpirationPolicy: Send + Sync {
    fn evaluate(&self, now: OffsetDateTime) -> CacheTime;
}

/// Fixed server, client and shared lifetimes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_outcache::cache::{ExpirationPolicy, FixedLifetimes};
/// use time::macros::datetime;
///
/// let policy = FixedLifetimes::new(Duration::from_secs(60), Duration::from_secs(30), None);
/// let now = datetime!(2026-01-01 12:00 UTC);
/// let time = policy.evaluate(now);
/// assert_eq!(time.absolute_expiration, datetime!(2026-01-01 12:01 UTC));
/// assert_eq!(time.client_lifetime, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLifetimes {
    server: Duration,
    client: Duration,
    shared: Option<Duration>,
}

impl FixedLifetimes {
    pub fn new(server: Duration, client: Duration, shared: Option<Duration>) -> Self {
        Self {
            server,
            client,
            shared,
        }
    }
}

impl ExpirationPolicy for FixedLifetimes {
    fn evaluate(&self, now: OffsetDateTime) -> CacheTime {
        CacheTime {
            client_lifetime: self.client,
            shared_lifetime: self.shared,
            absolute_expiration: saturating_add(now, self.server),
        }
    }
}

/// Expires every entry at the next occurrence of a UTC time of day; the client
/// lifetime is whatever remains until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyExpiry {
    at: Time,
}

impl DailyExpiry {
    pub fn at(at: Time) -> Self {
        Self { at }
    }
}

impl ExpirationPolicy for DailyExpiry {
    fn evaluate(&self, now: OffsetDateTime) -> CacheTime {
        let now = now.to_offset(UtcOffset::UTC);
        let today = now.replace_time(self.at);
        let expiration = if today > now {
            today
        } else {
            saturating_add(today, Duration::from_secs(24 * 60 * 60))
        };
        CacheTime {
            client_lifetime: (expiration - now).unsigned_abs(),
            shared_lifetime: None,
            absolute_expiration: expiration,
        }
    }
}

fn saturating_add(instant: OffsetDateTime, lifetime: Duration) -> OffsetDateTime {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|d| instant.checked_add(d))
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}
