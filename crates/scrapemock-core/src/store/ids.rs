//! Content-derived identifiers and timestamps.
//!
//! Page `gid`s and output `_id`s are SHA-256 digests of a canonical JSON
//! rendering of the record. Records are `BTreeMap`-backed, so key order never
//! affects the digest; the normalisation below takes care of the remaining
//! equivalences (query order, header value order, cookie pair order, URL
//! fragment and host case).

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::collection::{Record, field};
use crate::cookie::{self, CookieInput, CookieMap};

/// Fields of a page that take part in its `gid`.
pub const PAGE_GID_FIELDS: [&str; 8] = [
    "url",
    "method",
    "headers",
    "cookie",
    "fetch_type",
    "no_redirect",
    "body",
    "ua_type",
];

/// Bytes of the digest kept in a `gid` or `_id` (32 hex chars).
const ID_DIGEST_BYTES: usize = 16;

fn hex_digest(data: &[u8], take: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    result.iter().take(take).fold(String::new(), |mut acc, b| {
        // write! to String is infallible
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Fake UUID: full SHA-256 hex digest of `seed`, or of a random v4 UUID
/// when no seed is given.
pub fn fake_uuid(seed: Option<&str>) -> String {
    match seed {
        Some(seed) => hex_digest(seed.as_bytes(), usize::MAX),
        None => hex_digest(uuid::Uuid::new_v4().as_bytes(), usize::MAX),
    }
}

/// Format a timestamp the way the platform stores it (`%Y-%m-%dT%H:%M:%SZ`).
pub fn time_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Normalise a URL for content addressing.
///
/// Lowercases scheme and host, drops the fragment, and sorts query pairs by
/// key then value. Strings that do not parse as absolute URLs are returned
/// trimmed and otherwise untouched.
///
/// ```rust
/// use scrapemock_core::store::clean_uri;
///
/// assert_eq!(
///     clean_uri("HTTPS://Example.COM/a?b=2&a=1#top"),
///     "https://example.com/a?a=1&b=2"
/// );
/// ```
pub fn clean_uri(raw: &str) -> String {
    let raw = raw.trim();
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            debug!(url = %raw, error = %err, "URL not normalised");
            return raw.to_owned();
        },
    };

    url.set_fragment(None);
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    url.to_string()
}

fn normalize_headers(headers: &Value) -> Value {
    let Value::Object(map) = headers else {
        return headers.clone();
    };
    let normalized = map
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Array(items) => {
                    let mut items = items.clone();
                    items.sort_by_cached_key(ToString::to_string);
                    Value::Array(items)
                },
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(normalized)
}

fn normalize_cookie(cookie: &Value) -> Value {
    let Some(input) = CookieInput::from_value(cookie) else {
        return cookie.clone();
    };
    let mut cookies = CookieMap::new();
    cookie::parse_from_request(input, &mut cookies);
    Value::Object(
        cookies
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

/// Canonical sub-record a page `gid` is computed from.
pub fn page_gid_seed(page: &Record) -> Record {
    PAGE_GID_FIELDS
        .iter()
        .map(|&name| {
            let value = field(page, name);
            let value = match name {
                "url" => value
                    .as_str()
                    .map_or_else(|| value.clone(), |url| Value::String(clean_uri(url))),
                "headers" => normalize_headers(value),
                "cookie" => normalize_cookie(value),
                _ => value.clone(),
            };
            (name.to_owned(), value)
        })
        .collect()
}

/// Content-derived page id: `<host>-<digest>`, or just the digest when the
/// URL has no host.
pub fn generate_page_gid(page: &Record) -> String {
    let seed = page_gid_seed(page);
    let digest = hex_digest(Value::Object(seed.clone()).to_string().as_bytes(), ID_DIGEST_BYTES);
    let host = seed
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| Url::parse(url).ok())
        .and_then(|url| url.host_str().map(str::to_owned));
    match host {
        Some(host) => format!("{host}-{digest}"),
        None => digest,
    }
}

/// Content-derived output id over the fields not starting with `_`.
pub fn generate_output_id(output: &Record) -> String {
    let seed: Record = output
        .iter()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    hex_digest(Value::Object(seed).to_string().as_bytes(), ID_DIGEST_BYTES)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn page(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fake_uuid_is_seeded() {
        assert_eq!(fake_uuid(Some("abc")), fake_uuid(Some("abc")));
        assert_ne!(fake_uuid(Some("abc")), fake_uuid(Some("abd")));
        assert_eq!(fake_uuid(Some("abc")).len(), 64);
        assert_ne!(fake_uuid(None), fake_uuid(None));
    }

    #[test]
    fn test_time_stamp_format() {
        let at = Utc.with_ymd_and_hms(2019, 1, 20, 10, 20, 30).unwrap();
        assert_eq!(time_stamp(at), "2019-01-20T10:20:30Z");
    }

    #[test]
    fn test_clean_uri() {
        assert_eq!(
            clean_uri("https://www.example.com/abc?ccc=333&aaa=111&bbb=222#frag"),
            "https://www.example.com/abc?aaa=111&bbb=222&ccc=333"
        );
        assert_eq!(
            clean_uri("https://example.com/?a=2&a=1"),
            "https://example.com/?a=1&a=2"
        );
        assert_eq!(clean_uri("https://example.com/path?"), "https://example.com/path");
        assert_eq!(clean_uri("  not a url "), "not a url");
    }

    #[test]
    fn test_clean_uri_keeps_path_case() {
        assert_eq!(clean_uri("HTTP://WWW.Example.com/AbC"), "http://www.example.com/AbC");
    }

    #[test]
    fn test_page_gid_prefix_is_host() {
        let gid = generate_page_gid(&page(json!({"url": "https://www.example.com/abc"})));
        let (host, digest) = gid.rsplit_once('-').unwrap();
        assert_eq!(host, "www.example.com");
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn test_page_gid_without_url_is_bare_digest() {
        let gid = generate_page_gid(&Record::new());
        assert_eq!(gid.len(), 32);
        assert!(gid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_page_gid_equivalences() {
        let base = page(json!({
            "url": "https://www.example.com/abc?aaa=111&bbb=222",
            "headers": {"Accept": ["text/html", "application/json"]},
            "cookie": "aaa=111; bbb=222",
        }));
        let reordered = page(json!({
            "url": "HTTPS://WWW.EXAMPLE.COM/abc?bbb=222&aaa=111#ignored",
            "headers": {"Accept": ["application/json", "text/html"]},
            "cookie": ["bbb=222", "aaa=111"],
        }));
        assert_eq!(generate_page_gid(&base), generate_page_gid(&reordered));
    }

    #[test]
    fn test_page_gid_ignores_unrelated_fields() {
        let a = page(json!({"url": "https://example.com", "vars": {"a": 1}, "status": "parsed"}));
        let b = page(json!({"url": "https://example.com", "gid": "555"}));
        assert_eq!(generate_page_gid(&a), generate_page_gid(&b));
    }

    #[test]
    fn test_page_gid_sensitive_to_fetch_parameters() {
        let get = page(json!({"url": "https://example.com", "method": "GET"}));
        let post = page(json!({"url": "https://example.com", "method": "POST"}));
        assert_ne!(generate_page_gid(&get), generate_page_gid(&post));
    }

    #[test]
    fn test_output_id_ignores_system_fields() {
        let a = page(json!({"name": "x", "_collection": "a", "_job_id": 1}));
        let b = page(json!({"name": "x", "_collection": "b", "_gid": "g"}));
        let c = page(json!({"name": "y"}));
        assert_eq!(generate_output_id(&a), generate_output_id(&b));
        assert_ne!(generate_output_id(&a), generate_output_id(&c));
    }
}
