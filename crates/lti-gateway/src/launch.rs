//! Transport-neutral view of an inbound launch or session request.

use std::collections::BTreeMap;

/// Method, absolute URL, headers and form/query parameters of one request.
///
/// Header names are stored lowercased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
    parameters: BTreeMap<String, String>,
}

impl LaunchRequest {
    /// Create a request with no headers or parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// A `POST` carrying `parameters` as its form body.
    #[must_use]
    pub fn post(url: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        Self {
            parameters,
            ..Self::new("POST", url)
        }
    }

    /// A `GET` whose parameters arrive in the query string.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add a parameter, replacing a previous value for the same name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Add several parameters.
    #[must_use]
    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters.extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Uppercased HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Absolute request URL, including any query string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Form or query parameters supplied by the transport.
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Parameter value by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}
