//! # restkit
//!
//! Blocking JSON REST client for appliance configuration APIs.
//!
//! This crate provides:
//! - The [`RemoteClient`] trait consumed by the reconciliation engine
//! - [`HttpClient`], a `ureq` implementation with Basic auth, JSON headers
//!   and explicit redirect handling
//! - [`MockClient`], a scripted in-memory client that records every call
//! - A transport error taxonomy ([`Error`], [`ErrorCategory`])
//!
//! ## Example
//!
//! ```no_run
//! use restkit::{ClientConfig, HttpClient, RemoteClient};
//! use serde_json::json;
//!
//! let client = HttpClient::new(
//!     ClientConfig::new("https://fw1.example.net/api", "key", "secret"),
//! ).expect("valid config");
//!
//! let aliases = client.get("firewall/alias/search_item").unwrap();
//! let saved = client
//!     .post("firewall/alias/add_item", &json!({"alias": {"name": "blocklist"}}))
//!     .unwrap();
//! println!("{aliases} {saved}");
//! ```
//!
//! ## Response handling
//!
//! | Response             | Result                    |
//! |----------------------|---------------------------|
//! | 2xx, JSON body       | parsed body               |
//! | 2xx, empty body      | `{}`                      |
//! | 2xx, non-JSON body   | [`Error::ResponseFormat`] |
//! | non-2xx              | [`Error::Transport`]      |
//! | connect/DNS/timeout  | [`Error::Connectivity`]   |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::HttpClient;
pub use backend::{MockClient, RemoteClient};
pub use error::{Error, ErrorCategory, Result};
pub use types::{ClientConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, Method, RecordedCall};
