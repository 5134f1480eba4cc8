//! Outcome URL rewriting.
//!
//! Some consumers advertise an outcome service URL they do not actually
//! listen on (edX devstack reports `https://localhost:8000/` but serves plain
//! HTTP). Deployments fix that with a rewrite hook instead of patching the
//! protocol code.

/// Rewrites a consumer-supplied callback URL before it is contacted.
pub trait UrlRewrite: Send + Sync {
    /// Return the URL to actually use.
    fn rewrite(&self, url: &str) -> String;
}

/// Leaves URLs untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewrite;

impl UrlRewrite for NoRewrite {
    fn rewrite(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Replaces the first matching prefix.
#[derive(Debug, Clone, Default)]
pub struct PrefixRewrite {
    rules: Vec<(String, String)>,
}

impl PrefixRewrite {
    /// Create from `(from, to)` prefix pairs, checked in order.
    #[must_use]
    pub fn new(rules: Vec<(String, String)>) -> Self {
        Self { rules }
    }
}

impl UrlRewrite for PrefixRewrite {
    fn rewrite(&self, url: &str) -> String {
        for (from, to) in &self.rules {
            if let Some(rest) = url.strip_prefix(from.as_str()) {
                tracing::debug!(from = %from, to = %to, "Rewrote outcome service URL");
                return format!("{to}{rest}");
            }
        }
        url.to_string()
    }
}

impl<F> UrlRewrite for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn rewrite(&self, url: &str) -> String {
        self(url)
    }
}
