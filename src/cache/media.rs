//! Minimal content negotiation used to key cached variants by media type.

/// Media type used when nothing better can be negotiated.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json; charset=utf-8";

/// The media type negotiated for a cached request, placed in the context
/// extensions so the handler can produce a matching representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedMediaType(pub String);

/// Picks the media type a response will be produced in.
///
/// A fixed `configured` type always wins. Otherwise the first `Accept` entry
/// is used when its type is in `supported`; anything else falls back to
/// [`DEFAULT_MEDIA_TYPE`]. The `q` parameter is dropped, other parameters
/// are kept as sent.
pub fn negotiate(configured: Option<&str>, accept: Option<&str>, supported: &[String]) -> String {
    if let Some(media_type) = configured.filter(|m| !m.trim().is_empty()) {
        return media_type.trim().to_owned();
    }

    let Some(first) = accept.and_then(|a| a.split(',').map(str::trim).find(|e| !e.is_empty()))
    else {
        return DEFAULT_MEDIA_TYPE.to_owned();
    };

    let mut parts = first.split(';').map(str::trim);
    let essence = parts.next().unwrap_or_default();
    if !supported.iter().any(|s| s.eq_ignore_ascii_case(essence)) {
        return DEFAULT_MEDIA_TYPE.to_owned();
    }

    let params: Vec<&str> = parts
        .filter(|p| !p.is_empty() && !p.to_ascii_lowercase().starts_with("q="))
        .collect();
    if params.is_empty() {
        essence.to_owned()
    } else {
        format!("{essence}; {}", params.join("; "))
    }
}
