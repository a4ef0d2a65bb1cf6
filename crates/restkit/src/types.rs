//! Core types for the REST client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Default number of redirect hops followed before failing.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read request.
    Get,
    /// Write request with a JSON body.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Connection settings for one appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, e.g. `https://fw1.example.net/api`.
    pub base_url: String,
    /// API key (Basic auth user).
    pub api_key: String,
    /// API secret (Basic auth password).
    pub api_secret: String,
    /// Global timeout per request.
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Maximum redirect hops.
    pub max_redirects: u32,
}

impl ClientConfig {
    /// Create a config with default timeout and redirect limit.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable TLS verification bypass.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the redirect hop limit.
    pub fn max_redirects(mut self, hops: u32) -> Self {
        self.max_redirects = hops;
        self
    }

    /// Join an API path onto the base URL with exactly one separator.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// A request observed by [`crate::MockClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Request method.
    pub method: Method,
    /// Request path as passed to the client.
    pub path: String,
    /// JSON body for POST requests.
    pub body: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_single_separator() {
        let config = ClientConfig::new("https://fw1/api/", "k", "s");
        assert_eq!(
            config.url_for("/firewall/alias/search_item"),
            "https://fw1/api/firewall/alias/search_item"
        );

        let config = ClientConfig::new("https://fw1/api", "k", "s");
        assert_eq!(config.url_for("core/system/status"), "https://fw1/api/core/system/status");
    }

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::new("https://fw1/api", "k", "s")
            .insecure(true)
            .max_redirects(2);
        assert!(config.insecure);
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
    }
}
