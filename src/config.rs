//! Device and resource declarations loaded from `restsync.toml`
//!
//! ```toml
//! [devices.fw1]
//! url = "https://fw1.example.net/api"
//! api_key = "${FW1_KEY}"
//! api_secret = "${FW1_SECRET}"
//!
//! [[resources]]
//! kind = "firewall_alias"
//! device = "fw1"
//! name = "webservers"
//! fields = { type = "host", content = ["10.0.0.1", "10.0.0.2"] }
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{Ensure, Fields, KindRegistry, ResourceSpec, Targets};
use restkit::{ClientConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, HttpClient};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The whole config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// How to reach one appliance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// API base URL, e.g. `https://fw1.example.net/api`
    pub url: String,
    /// May reference environment variables (`${FW1_KEY}`)
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_redirects() -> u32 {
    DEFAULT_MAX_REDIRECTS
}

/// One declared configuration object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub kind: String,
    pub device: String,
    /// Business key; omitted for settings kinds, which are keyed by device
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub fields: Fields,
}

/// Restrict a command to some kinds or devices
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub kind: Option<String>,
    pub device: Option<String>,
}

impl Filter {
    pub fn matches(&self, resource: &ResourceConfig) -> bool {
        self.kind.as_deref().is_none_or(|k| k == resource.kind)
            && self.device.as_deref().is_none_or(|d| d == resource.device)
    }
}

impl DeviceConfig {
    /// Client settings with credentials expanded from the environment
    pub fn client_config(&self, device: &str) -> Result<ClientConfig> {
        let api_key = expand_secret(&self.api_key)
            .with_context(|| format!("api_key for device '{device}'"))?;
        let api_secret = expand_secret(&self.api_secret)
            .with_context(|| format!("api_secret for device '{device}'"))?;

        Ok(ClientConfig::new(&self.url, &api_key, &api_secret)
            .timeout(Duration::from_secs(self.timeout_secs))
            .insecure(self.insecure)
            .max_redirects(self.max_redirects))
    }
}

fn expand_secret(value: &str) -> Result<String> {
    Ok(shellexpand::env(value)?.into_owned())
}

impl Config {
    /// Load and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format")
    }

    /// Problems that would make a run fail or behave unexpectedly
    pub fn validate(&self, registry: &KindRegistry) -> Vec<String> {
        let mut problems = Vec::new();

        for (name, device) in &self.devices {
            if !(device.url.starts_with("https://") || device.url.starts_with("http://")) {
                problems.push(format!("device '{name}': url must start with http:// or https://"));
            }
        }

        let mut seen = BTreeSet::new();
        for (index, resource) in self.resources.iter().enumerate() {
            let at = format!("resources[{index}] ({})", resource.kind);

            let kind = match registry.get(&resource.kind) {
                Ok(kind) => kind,
                Err(e) => {
                    problems.push(format!("{at}: {e}"));
                    continue;
                }
            };
            if !self.devices.contains_key(&resource.device) {
                problems.push(format!("{at}: unknown device '{}'", resource.device));
            }

            match (&resource.name, kind.is_singleton()) {
                (None, false) => problems.push(format!("{at}: missing name")),
                (Some(_), true) => {
                    problems.push(format!("{at}: settings are keyed by device, remove name"));
                }
                (Some(name), false) if name.trim().is_empty() => {
                    problems.push(format!("{at}: empty name"));
                }
                _ => {}
            }
            if kind.is_singleton() && resource.ensure == Ensure::Absent {
                problems.push(format!("{at}: settings cannot be absent"));
            }

            let key = resource_key(resource);
            if !seen.insert((resource.kind.clone(), resource.device.clone(), key.clone())) {
                problems.push(format!(
                    "{at}: '{key}' on {} declared more than once",
                    resource.device
                ));
            }
        }

        problems
    }

    /// Declared resources matching the filter, in file order
    pub fn resources(&self, filter: &Filter) -> Vec<ResourceSpec> {
        self.resources
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| {
                let key = resource_key(r);
                let mut spec = ResourceSpec::present(&r.kind, &r.device, &key, r.fields.clone());
                spec.desired.ensure = r.ensure;
                spec
            })
            .collect()
    }

    /// HTTP clients for the given devices
    pub fn targets<'a>(&self, devices: impl IntoIterator<Item = &'a str>) -> Result<Targets> {
        let mut targets = Targets::new();
        for name in devices {
            let Some(device) = self.devices.get(name) else {
                bail!("Unknown device '{name}'");
            };
            let client = HttpClient::new(device.client_config(name)?)
                .with_context(|| format!("Could not set up client for device '{name}'"))?;
            targets.insert(name, Arc::new(client));
        }
        Ok(targets)
    }
}

/// Business key of a declaration; settings kinds use the device name
fn resource_key(resource: &ResourceConfig) -> String {
    resource
        .name
        .clone()
        .unwrap_or_else(|| resource.device.clone())
}
