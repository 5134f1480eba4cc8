//! Registered LTI consumers.
//!
//! The registry is built once at startup and shared read-only afterwards,
//! usually behind an `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::Config;

/// A learning-management system allowed to launch this tool.
#[derive(Clone)]
pub struct Consumer {
    key: String,
    secret: String,
    certificate: Option<PathBuf>,
}

impl Consumer {
    /// Create a consumer from its key and shared secret.
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            certificate: None,
        }
    }

    /// Attach the path of the consumer's certificate.
    #[must_use]
    pub fn with_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate = Some(path.into());
        self
    }

    /// OAuth consumer key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the persisted certificate, if one was provisioned.
    #[must_use]
    pub fn certificate(&self) -> Option<&Path> {
        self.certificate.as_deref()
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// Consumer key → consumer lookup table.
#[derive(Debug, Clone, Default)]
pub struct ConsumerRegistry {
    consumers: HashMap<String, Consumer>,
}

impl ConsumerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Writes the configured certificate blob to `config.cert_path` so signing
    /// code can refer to it by path. Call once, before serving requests.
    ///
    /// # Errors
    ///
    /// Returns error if the certificate file cannot be written.
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        let mut consumer = Consumer::new(&config.consumer_key, &config.consumer_secret);

        if let Some(cert) = config.consumer_cert.as_deref().filter(|cert| !cert.is_empty()) {
            std::fs::write(&config.cert_path, cert).with_context(|| {
                format!("failed to write consumer certificate to {}", config.cert_path.display())
            })?;
            tracing::info!(path = %config.cert_path.display(), "Wrote consumer certificate");
            consumer = consumer.with_certificate(&config.cert_path);
        }

        let mut registry = Self::new();
        registry.insert(consumer);

        tracing::info!(
            consumer_key = %config.consumer_key,
            consumers = registry.len(),
            "Consumer registry initialized"
        );

        Ok(registry)
    }

    /// Register a consumer, replacing any previous entry with the same key.
    pub fn insert(&mut self, consumer: Consumer) {
        self.consumers.insert(consumer.key.clone(), consumer);
    }

    /// Look up a consumer by key.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Consumer> {
        self.consumers.get(key)
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// True when no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl FromIterator<Consumer> for ConsumerRegistry {
    fn from_iter<I: IntoIterator<Item = Consumer>>(iter: I) -> Self {
        let mut registry = Self::new();
        for consumer in iter {
            registry.insert(consumer);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let registry: ConsumerRegistry =
            [Consumer::new("a", "s1"), Consumer::new("b", "s2")].into_iter().collect();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("a").map(Consumer::key), Some("a"));
        assert!(registry.lookup("c").is_none());
    }

    #[test]
    fn test_debug_hides_secret() {
        let consumer = Consumer::new("demo_key", "very-secret");
        let debug = format!("{consumer:?}");
        assert!(debug.contains("demo_key"));
        assert!(!debug.contains("very-secret"));

        let registry: ConsumerRegistry = [consumer].into_iter().collect();
        assert!(!format!("{registry:?}").contains("very-secret"));
    }

    #[test]
    fn test_initialize_writes_certificate() {
        let mut config = Config::for_testing();
        config.consumer_cert = Some("-----BEGIN CERTIFICATE-----\nabc\n".to_string());

        let registry = ConsumerRegistry::initialize(&config).unwrap();
        let consumer = registry.lookup("demo_key").unwrap();

        assert_eq!(consumer.certificate(), Some(config.cert_path.as_path()));
        let written = std::fs::read_to_string(&config.cert_path).unwrap();
        assert!(written.starts_with("-----BEGIN CERTIFICATE-----"));

        std::fs::remove_file(&config.cert_path).unwrap();
    }

    #[test]
    fn test_initialize_without_certificate() {
        let config = Config::for_testing();
        let registry = ConsumerRegistry::initialize(&config).unwrap();

        assert!(registry.lookup("demo_key").unwrap().certificate().is_none());
        assert!(!config.cert_path.exists());
    }
}
