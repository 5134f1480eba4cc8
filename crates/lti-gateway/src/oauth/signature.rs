//! Signature base strings and signature computation (RFC 5849 §3.4).

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::Url;

use super::encode::percent_encode;
use crate::error::VerificationError;

/// Parameter carrying the signature itself; never part of the base string.
pub const OAUTH_SIGNATURE: &str = "oauth_signature";

/// Supported `oauth_signature_method` values.
///
/// `PLAINTEXT` and `RSA-SHA1` are refused. A `PLAINTEXT` signature is the
/// signing key alone and covers none of the request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMethod {
    /// `HMAC-SHA1`, mandated by LTI 1.1.
    #[default]
    HmacSha1,
    /// `HMAC-SHA256`.
    HmacSha256,
}

impl SignatureMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl FromStr for SignatureMethod {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HMAC-SHA1" => Ok(Self::HmacSha1),
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            other => Err(VerificationError::malformed(format!(
                "unsupported signature method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme, host, non-default port and path; query and fragment dropped.
///
/// `Url` already lowercases scheme and host and elides default ports.
#[must_use]
pub fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// Encode, sort and join every parameter except `oauth_signature`.
#[must_use]
pub fn normalize_parameters(params: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| key.as_str() != OAUTH_SIGNATURE)
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    pairs.sort();

    pairs.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

/// `METHOD&enc(base_url)&enc(normalized parameters)`.
#[must_use]
pub fn base_string(method: &str, url: &Url, params: &BTreeMap<String, String>) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&normalize_parameters(params))
    )
}

/// Merge the URL's query pairs into `params`; explicit parameters win.
#[must_use]
pub fn with_query_parameters(
    url: &Url,
    params: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = params.clone();
    for (key, value) in url.query_pairs() {
        merged.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    merged
}

/// Compute the signature of `base` with an empty token secret.
pub(crate) fn compute(method: SignatureMethod, base: &str, consumer_secret: &str) -> String {
    let key = format!("{}&", percent_encode(consumer_secret));
    match method {
        SignatureMethod::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(base.as_bytes());
            STANDARD.encode(mac.finalize().into_bytes())
        }
        SignatureMethod::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(base.as_bytes());
            STANDARD.encode(mac.finalize().into_bytes())
        }
    }
}

/// Recompute and compare in constant time.
pub(crate) fn signature_matches(
    method: SignatureMethod,
    base: &str,
    consumer_secret: &str,
    supplied: &str,
) -> bool {
    let expected = compute(method, base, consumer_secret);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// `oauth_body_hash` value: base64 of the SHA-1 digest of the body.
#[must_use]
pub fn body_hash(body: &[u8]) -> String {
    use sha1::Digest;
    STANDARD.encode(Sha1::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> BTreeMap<String, String> {
        [
            ("a", "1"),
            ("c", "x y"),
            ("oauth_consumer_key", "demo_key"),
            ("oauth_nonce", "n1"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1700000000"),
            ("oauth_version", "1.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    const EXPECTED_BASE: &str = "POST&http%3A%2F%2Ftool.example%2Flti%2Flaunch&a%3D1%26b%3D2%26c%3Dx%2520y%26oauth_consumer_key%3Ddemo_key%26oauth_nonce%3Dn1%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1700000000%26oauth_version%3D1.0";

    #[test]
    fn test_base_url_normalization() {
        let url = Url::parse("HTTP://Tool.Example:80/lti/launch?b=2#frag").unwrap();
        assert_eq!(base_url(&url), "http://tool.example/lti/launch");

        let url = Url::parse("https://tool.example:8443/x").unwrap();
        assert_eq!(base_url(&url), "https://tool.example:8443/x");
    }

    #[test]
    fn test_base_string_includes_query_and_skips_signature() {
        let url = Url::parse("http://Tool.Example:80/lti/launch?b=2").unwrap();
        let mut params = sample_params();
        params.insert(OAUTH_SIGNATURE.to_string(), "ignored".to_string());

        let merged = with_query_parameters(&url, &params);
        assert_eq!(base_string("post", &url, &merged), EXPECTED_BASE);
    }

    #[test]
    fn test_hmac_sha1_vector() {
        assert_eq!(
            compute(SignatureMethod::HmacSha1, EXPECTED_BASE, "demo_secret"),
            "VlK/Fn3IfYjxbYpPbMpgh6JJMe8="
        );
    }

    #[test]
    fn test_signature_matches() {
        let sig = compute(SignatureMethod::HmacSha256, EXPECTED_BASE, "demo_secret");
        assert!(signature_matches(
            SignatureMethod::HmacSha256,
            EXPECTED_BASE,
            "demo_secret",
            &sig
        ));
        assert!(!signature_matches(SignatureMethod::HmacSha256, EXPECTED_BASE, "other", &sig));
        assert!(!signature_matches(
            SignatureMethod::HmacSha1,
            EXPECTED_BASE,
            "demo_secret",
            &sig
        ));
        assert!(!signature_matches(
            SignatureMethod::HmacSha1,
            EXPECTED_BASE,
            "demo_secret",
            ""
        ));
    }

    #[test]
    fn test_signature_method_parse() {
        assert_eq!("HMAC-SHA1".parse::<SignatureMethod>().unwrap(), SignatureMethod::HmacSha1);
        assert_eq!("HMAC-SHA256".parse::<SignatureMethod>().unwrap(), SignatureMethod::HmacSha256);
        for refused in ["PLAINTEXT", "RSA-SHA1", "hmac-sha1"] {
            assert!(
                matches!(
                    refused.parse::<SignatureMethod>(),
                    Err(VerificationError::MalformedRequest(_))
                ),
                "{refused}"
            );
        }
    }

    #[test]
    fn test_body_hash() {
        assert_eq!(body_hash(b"<xml/>"), "RWRMh1ZFeMnljarhalVgpJhQjGI=");
    }
}
