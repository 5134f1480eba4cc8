//! Configuration for the LTI gateway.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Default values used when the environment does not override them.
pub mod defaults {
    use std::time::Duration;

    /// Consumer key registered when `LTI_CONSUMER_KEY` is unset.
    pub const CONSUMER_KEY: &str = "__consumer_key__";

    /// Shared secret used when `CONSUMER_KEY_SECRET` is unset.
    pub const CONSUMER_SECRET: &str = "__lti_secret__";

    /// File the consumer certificate is written to at startup.
    pub const CERT_PATH: &str = "consumer_key.pem";

    /// Accepted distance between `oauth_timestamp` and the local clock.
    pub const TIMESTAMP_WINDOW: Duration = Duration::from_secs(300);

    /// Timeout for outbound grade posts.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout for outbound grade posts.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// `imsx_messageIdentifier` sent with every POX request.
    pub const MESSAGE_IDENTIFIER: &str = "lti_gateway_outcome";
}

/// Environment variable names.
pub mod env {
    /// Consumer key.
    pub const CONSUMER_KEY: &str = "LTI_CONSUMER_KEY";
    /// Consumer shared secret.
    pub const CONSUMER_SECRET: &str = "CONSUMER_KEY_SECRET";
    /// Consumer certificate (PEM blob).
    pub const CONSUMER_CERT: &str = "CONSUMER_KEY_CERT";
    /// Where to write the certificate.
    pub const CERT_PATH: &str = "LTI_CERT_PATH";
    /// Outcome URL rewrites, `from=>to` pairs separated by `;`.
    pub const URL_REWRITES: &str = "LTI_URL_REWRITES";
    /// Timestamp window in seconds, `0` disables the check.
    pub const TIMESTAMP_WINDOW: &str = "LTI_TIMESTAMP_WINDOW_SECS";
}

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Key of the single consumer provisioned from the environment.
    pub consumer_key: String,

    /// Shared secret for `consumer_key`.
    pub consumer_secret: String,

    /// Certificate blob to persist at startup (optional).
    pub consumer_cert: Option<String>,

    /// Path the certificate is written to.
    pub cert_path: PathBuf,

    /// Prefix rewrites applied to outcome service URLs.
    pub url_rewrites: Vec<(String, String)>,

    /// Timestamp freshness window, `None` disables the check.
    pub timestamp_window: Option<Duration>,

    /// Request timeout for grade posts.
    pub request_timeout: Duration,

    /// Connection timeout for grade posts.
    pub connect_timeout: Duration,

    /// Message identifier embedded in POX envelopes.
    pub message_identifier: String,
}

impl Config {
    /// Create a configuration for one consumer with default timeouts.
    #[must_use]
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            consumer_cert: None,
            cert_path: PathBuf::from(defaults::CERT_PATH),
            url_rewrites: Vec::new(),
            timestamp_window: Some(defaults::TIMESTAMP_WINDOW),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            message_identifier: defaults::MESSAGE_IDENTIFIER.to_string(),
        }
    }

    /// Create a test configuration (`demo_key` / `demo_secret`, short timeouts).
    ///
    /// The certificate path points into the system temp directory so tests
    /// never write into the working tree.
    #[must_use]
    pub fn for_testing() -> Self {
        let cert_file = format!("lti-gateway-{}.pem", uuid::Uuid::new_v4().simple());
        Self {
            cert_path: std::env::temp_dir().join(cert_file),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..Self::new("demo_key", "demo_secret")
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let consumer_key =
            std::env::var(env::CONSUMER_KEY).unwrap_or_else(|_| defaults::CONSUMER_KEY.into());
        let consumer_secret = match std::env::var(env::CONSUMER_SECRET) {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!(
                    var = env::CONSUMER_SECRET,
                    "Consumer secret not set, falling back to the built-in default"
                );
                defaults::CONSUMER_SECRET.to_string()
            }
        };

        let mut config = Self::new(consumer_key, consumer_secret);
        config.consumer_cert = std::env::var(env::CONSUMER_CERT).ok();

        if let Ok(path) = std::env::var(env::CERT_PATH) {
            config.cert_path = PathBuf::from(path);
        }

        if let Ok(raw) = std::env::var(env::URL_REWRITES) {
            config.url_rewrites = parse_rewrites(&raw)?;
        }

        if let Ok(raw) = std::env::var(env::TIMESTAMP_WINDOW) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", env::TIMESTAMP_WINDOW))?;
            config.timestamp_window = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Check if a certificate blob is configured.
    #[must_use]
    pub fn has_certificate(&self) -> bool {
        self.consumer_cert.as_deref().is_some_and(|cert| !cert.is_empty())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("consumer_key", &self.consumer_key)
            .field("has_certificate", &self.has_certificate())
            .field("cert_path", &self.cert_path)
            .field("url_rewrites", &self.url_rewrites)
            .field("timestamp_window", &self.timestamp_window)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Parse `from=>to` pairs separated by `;`.
///
/// # Errors
///
/// Returns error when an entry has no `=>` separator or an empty prefix.
pub fn parse_rewrites(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (from, to) = entry
                .split_once("=>")
                .with_context(|| format!("rewrite entry '{entry}' is missing '=>'"))?;
            let from = from.trim();
            anyhow::ensure!(!from.is_empty(), "rewrite entry '{entry}' has an empty prefix");
            Ok((from.to_string(), to.trim().to_string()))
        })
        .collect()
}
