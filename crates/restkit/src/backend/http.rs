//! Blocking HTTP backend built on `ureq`.
//!
//! Redirects are followed by hand rather than by the agent so that the
//! method rules are explicit: 307/308 replay the same method and body,
//! 301/302/303 continue as a bodiless GET.

use crate::backend::RemoteClient;
use crate::error::{Error, Result};
use crate::types::{ClientConfig, Method};
use base64::Engine;
use serde_json::Value;
use url::Url;

/// HTTP client for one appliance.
///
/// # Example
///
/// ```no_run
/// use restkit::{ClientConfig, HttpClient, RemoteClient};
///
/// let config = ClientConfig::new("https://fw1.example.net/api", "key", "secret");
/// let client = HttpClient::new(config).unwrap();
/// let status = client.get("core/system/status").unwrap();
/// println!("{status}");
/// ```
pub struct HttpClient {
    agent: ureq::Agent,
    config: ClientConfig,
    authorization: String,
}

/// What to do with a response status before reading its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redirect {
    /// Replay the same method and body at the new location.
    Preserve,
    /// Continue with a GET and no body.
    SwitchToGet,
}

fn redirect_for(status: u16) -> Option<Redirect> {
    match status {
        307 | 308 => Some(Redirect::Preserve),
        301..=303 => Some(Redirect::SwitchToGet),
        _ => None,
    }
}

impl HttpClient {
    /// Create a client from connection settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let scheme = Url::parse(&config.base_url).map(|u| u.scheme().to_string());
        if !matches!(scheme.as_deref(), Ok("http" | "https")) {
            return Err(Error::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        let mut builder = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false);

        if config.insecure {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }

        let agent = ureq::Agent::new_with_config(builder.build());
        let credentials = format!("{}:{}", config.api_key, config.api_secret);
        let authorization = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        Ok(Self {
            agent,
            config,
            authorization,
        })
    }

    /// Connection settings this client was built from.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let start = self.config.url_for(path);
        let mut url = Url::parse(&start)
            .map_err(|e| Error::InvalidConfig(format!("invalid request URL '{start}': {e}")))?;
        let mut method = method;
        let mut payload = body;

        for _ in 0..=self.config.max_redirects {
            log::trace!("{method} {url}");
            let mut response = self.send(method, &url, payload)?;
            let status = response.status().as_u16();

            if let Some(redirect) = redirect_for(status) {
                let location = response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::ResponseFormat {
                        url: url.to_string(),
                        message: format!("HTTP {status} without a Location header"),
                    })?;
                let next = resolve_location(&url, location)?;
                log::debug!("{method} {url} redirected ({status}) to {next}");

                if redirect == Redirect::SwitchToGet {
                    method = Method::Get;
                    payload = None;
                }
                url = next;
                continue;
            }

            let text = response
                .body_mut()
                .read_to_string()
                .map_err(|e| Error::connectivity(url.as_str(), e.to_string()))?;

            if !(200..300).contains(&status) {
                return Err(Error::transport(status, text));
            }
            return parse_body(url.as_str(), &text);
        }

        Err(Error::TooManyRedirects {
            url: start,
            hops: self.config.max_redirects,
        })
    }

    fn send(
        &self,
        method: Method,
        url: &Url,
        payload: Option<&Value>,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let result = match method {
            Method::Get => self
                .agent
                .get(url.as_str())
                .header("Authorization", self.authorization.as_str())
                .header("Accept", "application/json")
                .call(),
            Method::Post => {
                let empty = Value::Object(serde_json::Map::new());
                self.agent
                    .post(url.as_str())
                    .header("Authorization", self.authorization.as_str())
                    .header("Accept", "application/json")
                    .send_json(payload.unwrap_or(&empty))
            }
        };

        result.map_err(|e| match e {
            ureq::Error::StatusCode(status) => Error::transport(status, String::new()),
            other => Error::connectivity(url.as_str(), other.to_string()),
        })
    }
}

impl RemoteClient for HttpClient {
    fn get(&self, path: &str) -> Result<Value> {
        self.execute(Method::Get, path, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.execute(Method::Post, path, Some(body))
    }
}

/// Parse a response body; an empty body is an empty object.
fn parse_body(url: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text).map_err(|e| Error::ResponseFormat {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Resolve a `Location` header against the URL that produced it.
fn resolve_location(current: &Url, location: &str) -> Result<Url> {
    current.join(location).map_err(|e| Error::ResponseFormat {
        url: current.to_string(),
        message: format!("invalid Location header '{location}': {e}"),
    })
}
