//! HTTP cache validators
//!
//! `ETag` and `Last-Modified` are derived from file metadata, so a file is
//! never hashed just to answer a conditional request.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Validators for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    pub last_modified: Option<String>,
    modified_secs: Option<i64>,
}

impl Validators {
    pub fn new(len: u64, modified: Option<SystemTime>) -> Self {
        let modified_secs = modified.and_then(|t| {
            t.duration_since(UNIX_EPOCH)
                .ok()
                .and_then(|d| i64::try_from(d.as_secs()).ok())
        });
        Self {
            etag: generate_etag(len, modified_secs),
            last_modified: modified_secs.and_then(format_http_date),
            modified_secs,
        }
    }

    /// Whether the client's copy is current and a 304 can be sent.
    ///
    /// `If-None-Match` wins over `If-Modified-Since` when both are sent.
    pub fn is_not_modified(
        &self,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
    ) -> bool {
        if if_none_match.is_some() {
            return check_etag_match(if_none_match, &self.etag);
        }
        match (self.modified_secs, if_modified_since.and_then(parse_http_date)) {
            (Some(modified), Some(since)) => modified <= since,
            _ => false,
        }
    }
}

/// Weak-style `ETag` from size and modification time, e.g. `"1f4-65a0c3d2"`
pub fn generate_etag(len: u64, modified_secs: Option<i64>) -> String {
    format!("\"{len:x}-{:x}\"", modified_secs.unwrap_or(0))
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single tag, a comma-separated list, and `*`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

fn format_http_date(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.format(HTTP_DATE_FORMAT).to_string())
}

fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> Option<SystemTime> {
        Some(UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn test_generate_etag() {
        let etag = generate_etag(500, Some(0x65a0_c3d2));
        assert_eq!(etag, "\"1f4-65a0c3d2\"");
    }

    #[test]
    fn test_etag_tracks_metadata() {
        let a = Validators::new(10, at(1_700_000_000));
        let b = Validators::new(10, at(1_700_000_000));
        let c = Validators::new(11, at(1_700_000_000));
        let d = Validators::new(10, at(1_700_000_001));
        assert_eq!(a.etag, b.etag);
        assert_ne!(a.etag, c.etag);
        assert_ne!(a.etag, d.etag);
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_last_modified_format() {
        let v = Validators::new(1, at(1_700_000_000));
        assert_eq!(
            v.last_modified.as_deref(),
            Some("Tue, 14 Nov 2023 22:13:20 GMT")
        );
    }

    #[test]
    fn test_if_modified_since() {
        let v = Validators::new(1, at(1_700_000_000));
        assert!(v.is_not_modified(None, Some("Tue, 14 Nov 2023 22:13:20 GMT")));
        assert!(v.is_not_modified(None, Some("Wed, 15 Nov 2023 00:00:00 GMT")));
        assert!(!v.is_not_modified(None, Some("Mon, 13 Nov 2023 00:00:00 GMT")));
        assert!(!v.is_not_modified(None, Some("garbage")));
        assert!(!v.is_not_modified(None, None));
    }

    #[test]
    fn test_etag_wins_over_date() {
        let v = Validators::new(1, at(1_700_000_000));
        assert!(!v.is_not_modified(
            Some("\"other\""),
            Some("Wed, 15 Nov 2023 00:00:00 GMT")
        ));
        assert!(v.is_not_modified(Some(&v.etag.clone()), None));
    }
}
