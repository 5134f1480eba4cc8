//! `Authorization: OAuth ...` header parsing and rendering (RFC 5849 §3.5.1).

use std::collections::BTreeMap;

use super::encode::{percent_decode, percent_encode};

/// Parse the OAuth parameters out of an `Authorization` header value.
///
/// Returns `None` when the header does not use the OAuth scheme or an entry
/// is not a quoted `key="value"` pair. `realm` is dropped.
#[must_use]
pub fn parse_authorization(value: &str) -> Option<BTreeMap<String, String>> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("OAuth") {
        return None;
    }

    let mut params = BTreeMap::new();
    for entry in rest.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (key, raw) = entry.split_once('=')?;
        let raw = raw.trim().strip_prefix('"')?.strip_suffix('"')?;
        let key = percent_decode(key.trim())?;
        if key == "realm" {
            continue;
        }
        params.insert(key, percent_decode(raw)?);
    }
    Some(params)
}

/// Render the `oauth_*` entries of `params` as an `Authorization` header value.
#[must_use]
pub fn authorization_header(params: &BTreeMap<String, String>) -> String {
    let fields = params
        .iter()
        .filter(|(key, _)| key.starts_with("oauth_"))
        .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth realm=\"\", {fields}")
}
