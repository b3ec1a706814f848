//! Cookie header parsing and encoding.
//!
//! Request cookies (`Cookie:` header) and response cookies (`Set-Cookie:`
//! headers) are accumulated into a [`CookieMap`]. Response cookies honour the
//! `Expires` attribute: a cookie that already expired is removed from the map
//! instead of being set.
//!
//! ```rust
//! use scrapemock_core::cookie;
//!
//! let header = cookie::update(
//!     "aaa=111; bbb=222; ccc=333",
//!     [
//!         "aaa=deleted; Expires=Thu, Jan 01 1970 00:00:00 UTC; path=/",
//!         "bbb=555; path=/",
//!         "ddd=444; path=/; expires=Wed, Jan 01 3000 00:00:00 UTC",
//!     ],
//! );
//! assert_eq!(header, "bbb=555; ccc=333; ddd=444");
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Parsed cookies, sorted by name.
pub type CookieMap = BTreeMap<String, String>;

/// Formats tried, in order, after the weekday and zone suffix are removed.
const EXPIRES_FORMATS: &[&str] = &[
    "%b %d %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%y %H:%M:%S",
];

/// Cookies in one of the accepted shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieInput {
    /// A `key=value; key=value` header string.
    Raw(String),
    /// One `key=value[; attribute=value...]` entry per cookie.
    Pairs(Vec<String>),
    /// Cookies already parsed.
    Map(CookieMap),
}

impl CookieInput {
    /// Interpret a JSON value as cookies.
    ///
    /// Strings are raw headers, arrays are pairs and objects are maps.
    /// Non-string scalars inside arrays and objects are stringified.
    /// Returns `None` for `null` and other scalars.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => Some(Self::Raw(raw.clone())),
            Value::Array(items) => Some(Self::Pairs(items.iter().map(scalar_to_string).collect())),
            Value::Object(map) => Some(Self::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), scalar_to_string(value)))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn into_entries(self) -> Vec<String> {
        match self {
            Self::Raw(raw) => raw
                .split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect(),
            Self::Pairs(pairs) => pairs,
            Self::Map(map) => map.into_iter().map(|(k, v)| format!("{k}={v}")).collect(),
        }
    }
}

impl From<&str> for CookieInput {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_owned())
    }
}

impl From<String> for CookieInput {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<Vec<String>> for CookieInput {
    fn from(pairs: Vec<String>) -> Self {
        Self::Pairs(pairs)
    }
}

impl From<Vec<&str>> for CookieInput {
    fn from(pairs: Vec<&str>) -> Self {
        Self::Pairs(pairs.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CookieInput {
    fn from(pairs: [&str; N]) -> Self {
        Self::Pairs(pairs.into_iter().map(str::to_owned).collect())
    }
}

impl From<CookieMap> for CookieInput {
    fn from(map: CookieMap) -> Self {
        Self::Map(map)
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge request cookies into `cookie_map`.
///
/// Each entry is split on its first `=`; an entry without `=` is stored with
/// an empty value. Later entries win.
pub fn parse_from_request(cookies: impl Into<CookieInput>, cookie_map: &mut CookieMap) {
    let entries = match cookies.into() {
        CookieInput::Map(map) => {
            cookie_map.extend(map);
            return;
        },
        other => other.into_entries(),
    };
    for entry in entries {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        cookie_map.insert(key.to_owned(), value.to_owned());
    }
}

/// Merge response cookies into `cookie_map`, dropping expired ones.
pub fn parse_from_response(cookies: impl Into<CookieInput>, cookie_map: &mut CookieMap) {
    parse_from_response_at(cookies, cookie_map, Utc::now());
}

/// [`parse_from_response`] evaluated at `now`.
pub fn parse_from_response_at(
    cookies: impl Into<CookieInput>,
    cookie_map: &mut CookieMap,
    now: DateTime<Utc>,
) {
    let entries = match cookies.into() {
        CookieInput::Map(map) => {
            cookie_map.extend(map);
            return;
        },
        other => other.into_entries(),
    };

    for entry in entries {
        let mut parts = entry.split(';');
        let Some((key, value)) = parts.next().and_then(|head| head.trim().split_once('=')) else {
            debug!(entry = %entry, "Skipping response cookie without name");
            continue;
        };

        let expires = parts
            .filter_map(|attribute| attribute.trim().split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("expires"))
            .map(|(_, raw)| raw.trim());

        if let Some(raw) = expires {
            match parse_expires(raw) {
                Some(at) if at < now => {
                    cookie_map.remove(key);
                    continue;
                },
                Some(_) => {},
                None => debug!(expires = %raw, "Unparseable cookie expiry, keeping cookie"),
            }
        }
        cookie_map.insert(key.to_owned(), value.to_owned());
    }
}

/// Parse an `Expires` attribute value.
///
/// Accepts RFC 2822 dates (`Thu, 01 Jan 1970 00:00:00 GMT`), the
/// `Thu, Jan 01 1970 00:00:00 UTC` form and `01-Jan-1970` cookie dates, with
/// or without a time. The weekday is ignored.
pub fn parse_expires(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }

    let without_weekday = raw.split_once(", ").map_or(raw, |(_, rest)| rest);
    let bare = ["UTC", "GMT", "Z"]
        .iter()
        .find_map(|zone| without_weekday.strip_suffix(zone))
        .unwrap_or(without_weekday)
        .trim();

    EXPIRES_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(bare, format).ok())
        .or_else(|| {
            ["%d-%b-%Y", "%b %d %Y", "%d %b %Y"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(bare, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Apply request then response cookies into a fresh map.
pub fn update_as_map(
    request_cookies: impl Into<CookieInput>,
    response_cookies: impl Into<CookieInput>,
) -> CookieMap {
    let mut cookie_map = CookieMap::new();
    parse_from_request(request_cookies, &mut cookie_map);
    parse_from_response(response_cookies, &mut cookie_map);
    cookie_map
}

/// Apply request then response cookies and encode as a request header.
pub fn update(
    request_cookies: impl Into<CookieInput>,
    response_cookies: impl Into<CookieInput>,
) -> String {
    encode_to_header(&update_as_map(request_cookies, response_cookies))
}

/// Encode cookies as `key=value; key=value`.
pub fn encode_to_header(cookie_map: &CookieMap) -> String {
    cookie_map
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether every cookie in `cookie_map` is present in `base` with the same value.
pub fn include(base: &CookieMap, cookie_map: &CookieMap) -> bool {
    cookie_map
        .iter()
        .all(|(key, value)| base.get(key) == Some(value))
}
