//! OAuth 1.0a request signing as used by LTI 1.1.
//!
//! Only the consumer-key/shared-secret profile LTI relies on is implemented:
//! no token credentials, no RSA signatures.
//!
//! ## Supported Standards
//! - RFC 5849: The OAuth 1.0 Protocol (HMAC-SHA1, HMAC-SHA256)
//! - OAuth Request Body Hash (`oauth_body_hash`) for LTI outcome calls

pub mod encode;
pub mod header;
pub mod signature;

use std::collections::BTreeMap;

use url::Url;

pub use signature::{OAUTH_SIGNATURE, SignatureMethod, body_hash};

use crate::consumer::Consumer;
use crate::error::{VerificationError, VerificationResult};

/// Fresh `oauth_*` protocol parameters for an outgoing request.
///
/// Contains consumer key, nonce, timestamp, signature method and version;
/// the signature is added by [`sign_request`].
#[must_use]
pub fn oauth_parameters(consumer_key: &str, method: SignatureMethod) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("oauth_consumer_key".to_string(), consumer_key.to_string());
    params.insert("oauth_nonce".to_string(), uuid::Uuid::new_v4().simple().to_string());
    params.insert("oauth_timestamp".to_string(), chrono::Utc::now().timestamp().to_string());
    params.insert("oauth_signature_method".to_string(), method.as_str().to_string());
    params.insert("oauth_version".to_string(), "1.0".to_string());
    params
}

/// Sign `params` for `method url` with the consumer's secret.
///
/// Uses the `oauth_signature_method` already present in `params` (HMAC-SHA1
/// when absent) and inserts `oauth_signature`. Query parameters of `url` are
/// covered by the signature.
///
/// # Errors
///
/// Returns `MalformedRequest` if `url` does not parse or the signature method
/// is unsupported.
pub fn sign_request(
    consumer: &Consumer,
    method: &str,
    url: &str,
    params: &mut BTreeMap<String, String>,
) -> VerificationResult<()> {
    let url = Url::parse(url)
        .map_err(|e| VerificationError::malformed(format!("invalid URL '{url}': {e}")))?;
    let signature_method = match params.get("oauth_signature_method") {
        Some(name) => name.parse()?,
        None => SignatureMethod::default(),
    };

    let merged = signature::with_query_parameters(&url, params);
    let base = signature::base_string(method, &url, &merged);
    let value = signature::compute(signature_method, &base, consumer.secret());

    params.insert(OAUTH_SIGNATURE.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_parameters() {
        let params = oauth_parameters("demo_key", SignatureMethod::HmacSha1);
        assert_eq!(params["oauth_consumer_key"], "demo_key");
        assert_eq!(params["oauth_signature_method"], "HMAC-SHA1");
        assert_eq!(params["oauth_version"], "1.0");
        assert!(params["oauth_timestamp"].parse::<i64>().is_ok());
        assert!(!params.contains_key(OAUTH_SIGNATURE));
    }

    #[test]
    fn test_nonces_are_unique() {
        let a = oauth_parameters("k", SignatureMethod::HmacSha1);
        let b = oauth_parameters("k", SignatureMethod::HmacSha1);
        assert_ne!(a["oauth_nonce"], b["oauth_nonce"]);
    }

    #[test]
    fn test_sign_request_is_deterministic_for_fixed_inputs() {
        let consumer = Consumer::new("demo_key", "demo_secret");
        let mut params: BTreeMap<String, String> = [
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
        .collect();

        sign_request(&consumer, "POST", "http://tool.example/lti/launch?b=2", &mut params)
            .unwrap();
        assert_eq!(params[OAUTH_SIGNATURE], "VlK/Fn3IfYjxbYpPbMpgh6JJMe8=");
    }

    #[test]
    fn test_sign_request_rejects_bad_url() {
        let consumer = Consumer::new("k", "s");
        let mut params = BTreeMap::new();
        let err = sign_request(&consumer, "POST", "not a url", &mut params).unwrap_err();
        assert!(matches!(err, VerificationError::MalformedRequest(_)));
    }
}
