//! The query component of a request target.

use std::collections::HashMap;
use std::sync::OnceLock;

/// The raw query string plus a lazily materialized key→value map.
///
/// `§3`: "raw query bytes + lazily materialized key→value map" — the map
/// is only built the first time a handler calls [`Query::get`] or
/// [`Query::map`], since most requests never inspect it.
#[derive(Debug, Default)]
pub struct Query {
    raw: String,
    map: OnceLock<HashMap<String, String>>,
}

impl Query {
    pub(crate) fn new(raw: String) -> Self {
        Query {
            raw,
            map: OnceLock::new(),
        }
    }

    /// The raw, still-percent-encoded query string (without the leading `?`).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn materialize(&self) -> &HashMap<String, String> {
        self.map.get_or_init(|| parse_query(&self.raw))
    }

    /// The first value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.materialize().get(key).map(|s| s.as_str())
    }

    /// The fully materialized key→value map.
    pub fn map(&self) -> &HashMap<String, String> {
        self.materialize()
    }

    pub(crate) fn reset(&mut self, raw: String) {
        self.raw = raw;
        self.map = OnceLock::new();
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if raw.is_empty() {
        return map;
    }
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((k, v)) => {
                map.insert(decode_component(k), decode_component(v));
            }
            None => {
                map.insert(decode_component(pair), String::new());
            }
        }
    }
    map
}

/// `application/x-www-form-urlencoded`-style decoding: `+` becomes a space,
/// `%XX` becomes the byte it encodes. Malformed escapes are passed through
/// verbatim rather than rejected, matching how browsers actually behave.
fn decode_component(s: &str) -> String {
    percent_decode(s, true)
}

/// Percent-decode a request-target path segment: `%XX` becomes the byte it
/// encodes, but `+` is left alone (it has no special meaning outside a
/// form-encoded query or body).
pub(crate) fn decode_path(s: &str) -> String {
    percent_decode(s, false)
}

fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = &s[i + 1..i + 3];
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
