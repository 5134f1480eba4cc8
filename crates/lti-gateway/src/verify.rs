//! Verification of OAuth-signed LTI launch requests.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::config::{Config, defaults};
use crate::consumer::ConsumerRegistry;
use crate::error::{VerificationError, VerificationResult};
use crate::launch::LaunchRequest;
use crate::oauth::signature::{self, SignatureMethod};
use crate::oauth::{OAUTH_SIGNATURE, header};
use crate::roles::parse_roles;

/// Verifier tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Maximum distance between `oauth_timestamp` and now. `None` disables the check.
    pub timestamp_window: Option<Duration>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            timestamp_window: Some(defaults::TIMESTAMP_WINDOW),
        }
    }
}

impl From<&Config> for VerifierOptions {
    fn from(config: &Config) -> Self {
        Self {
            timestamp_window: config.timestamp_window,
        }
    }
}

/// A verified launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Consumer that signed the request.
    pub consumer_key: String,
    /// Every signed parameter except `oauth_signature`.
    pub parameters: BTreeMap<String, String>,
    /// `roles` split on commas.
    pub roles: Vec<String>,
}

/// Checks inbound requests against a [`ConsumerRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestVerifier {
    options: VerifierOptions,
}

impl RequestVerifier {
    /// Create a verifier with explicit options.
    #[must_use]
    pub const fn new(options: VerifierOptions) -> Self {
        Self { options }
    }

    /// Verify `request` and extract its launch parameters.
    ///
    /// The consumer is resolved before any signature work, so unknown keys
    /// fail fast with `UnknownConsumer`.
    pub fn verify(
        &self,
        registry: &ConsumerRegistry,
        request: &LaunchRequest,
    ) -> VerificationResult<LaunchOutcome> {
        let url = effective_url(request)?;
        let params = collect_parameters(request, &url)?;

        let key = params
            .get("oauth_consumer_key")
            .ok_or_else(|| VerificationError::malformed("oauth_consumer_key not in request"))?;
        let consumer = registry.lookup(key).ok_or_else(|| {
            tracing::debug!(consumer_key = %key, "verify_request failed: unknown consumer");
            VerificationError::unknown_consumer(key.as_str())
        })?;

        let supplied = require(&params, OAUTH_SIGNATURE)?;
        let method: SignatureMethod = require(&params, "oauth_signature_method")?.parse()?;
        let timestamp = require(&params, "oauth_timestamp")?;
        require(&params, "oauth_nonce")?;
        if let Some(version) = params.get("oauth_version") {
            if version != "1.0" {
                return Err(VerificationError::malformed(format!(
                    "unsupported oauth_version '{version}'"
                )));
            }
        }

        let base = signature::base_string(request.method(), &url, &params);
        if !signature::signature_matches(method, &base, consumer.secret(), supplied) {
            tracing::debug!(
                consumer_key = %key,
                method = %method,
                "verify_request failed: signature mismatch"
            );
            return Err(VerificationError::InvalidSignature);
        }

        self.check_timestamp(timestamp)?;

        let mut parameters = params.clone();
        parameters.remove(OAUTH_SIGNATURE);
        let roles = parse_roles(parameters.get("roles").map(String::as_str));

        tracing::debug!(consumer_key = %key, roles = roles.len(), "verify_request success");

        Ok(LaunchOutcome {
            consumer_key: consumer.key().to_string(),
            parameters,
            roles,
        })
    }

    fn check_timestamp(&self, raw: &str) -> VerificationResult<()> {
        let Some(window) = self.options.timestamp_window else {
            return Ok(());
        };

        let timestamp: i64 = raw
            .trim()
            .parse()
            .map_err(|_| VerificationError::malformed("oauth_timestamp is not a number"))?;
        let skew = Duration::from_secs(chrono::Utc::now().timestamp().abs_diff(timestamp));

        if skew > window {
            tracing::debug!(skew_secs = skew.as_secs(), "verify_request failed: stale timestamp");
            return Err(VerificationError::StaleTimestamp { skew });
        }
        Ok(())
    }
}

/// Verify with default options.
pub fn verify(
    registry: &ConsumerRegistry,
    request: &LaunchRequest,
) -> VerificationResult<LaunchOutcome> {
    RequestVerifier::default().verify(registry, request)
}

/// Request URL as the consumer signed it.
///
/// TLS-terminating proxies forward `http` URLs; `X-Forwarded-Proto: https`
/// restores the scheme the consumer saw.
fn effective_url(request: &LaunchRequest) -> VerificationResult<Url> {
    let mut url = Url::parse(request.url())
        .map_err(|e| VerificationError::malformed(format!("invalid request URL: {e}")))?;

    let forwarded_https = request
        .header("x-forwarded-proto")
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
    if forwarded_https && url.scheme() == "http" {
        url.set_scheme("https")
            .map_err(|()| VerificationError::malformed("cannot switch request URL to https"))?;
    }
    Ok(url)
}

/// Authorization header parameters, overridden by explicit parameters, plus
/// query-string pairs not already present.
fn collect_parameters(
    request: &LaunchRequest,
    url: &Url,
) -> VerificationResult<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    if let Some(value) = request.header("authorization") {
        let is_oauth =
            value.trim_start().get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("oauth"));
        if is_oauth {
            params = header::parse_authorization(value).ok_or_else(|| {
                VerificationError::malformed("unparseable OAuth Authorization header")
            })?;
        }
    }
    params.extend(request.parameters().iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(signature::with_query_parameters(url, &params))
}

fn require<'a>(params: &'a BTreeMap<String, String>, name: &str) -> VerificationResult<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| VerificationError::malformed(format!("{name} not in request")))
}
