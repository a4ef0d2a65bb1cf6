//! Client trait and implementations.
//!
//! [`RemoteClient`] is the seam between the reconciliation engine and the
//! network. [`http::HttpClient`] talks to a real appliance; [`MockClient`]
//! serves scripted responses and records every call so tests can count
//! requests per endpoint.
//!
//! ```
//! use restkit::{Method, MockClient, RemoteClient};
//! use serde_json::json;
//!
//! let mock = MockClient::new();
//! mock.respond(Method::Get, "firewall/alias/search_item", json!({"rows": []}));
//!
//! let body = mock.get("firewall/alias/search_item").unwrap();
//! assert_eq!(body, json!({"rows": []}));
//! assert_eq!(mock.count(Method::Get, "firewall/alias/search_item"), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{Method, RecordedCall};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Remote client contract consumed by the engine.
///
/// Both calls return the parsed JSON body. An empty body is returned as an
/// empty object.
pub trait RemoteClient: Send + Sync {
    /// Issue a GET request against an API path.
    fn get(&self, path: &str) -> Result<Value>;

    /// Issue a POST request with a JSON body against an API path.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;
}

impl<C: RemoteClient + ?Sized> RemoteClient for Arc<C> {
    fn get(&self, path: &str) -> Result<Value> {
        (**self).get(path)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        (**self).post(path, body)
    }
}

type ResponseQueue = HashMap<(Method, String), VecDeque<Result<Value>>>;

/// Scripted client for testing without network access.
///
/// Responses are queued per `(method, path)` and consumed in order; the last
/// queued response is sticky and answers every further request. Requests
/// without a scripted response fail with HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    responses: Arc<Mutex<ResponseQueue>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockClient {
    /// Create a new mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(&self, method: Method, path: impl Into<String>, body: Value) -> &Self {
        self.push(method, path.into(), Ok(body));
        self
    }

    /// Queue a failure.
    pub fn fail(&self, method: Method, path: impl Into<String>, error: Error) -> &Self {
        self.push(method, path.into(), Err(error));
        self
    }

    fn push(&self, method: Method, path: String, response: Result<Value>) {
        lock(&self.responses)
            .entry((method, path))
            .or_default()
            .push_back(response);
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls received for a method and path.
    pub fn count(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Number of calls whose path starts with a prefix.
    pub fn count_prefix(&self, method: Method, prefix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .count()
    }

    /// Bodies posted to a path, in order.
    pub fn posted(&self, path: &str) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == Method::Post && c.path == path)
            .filter_map(|c| c.body.clone())
            .collect()
    }

    /// Forget recorded calls, keeping scripted responses.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn answer(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        lock(&self.calls).push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let mut responses = lock(&self.responses);
        let Some(queue) = responses.get_mut(&(method, path.to_string())) else {
            return Err(Error::transport(
                404,
                format!("no mock response for {method} {path}"),
            ));
        };

        if queue.len() > 1 {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(Error::transport(404, "empty mock queue")))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(Error::transport(404, "empty mock queue")))
        }
    }
}

impl RemoteClient for MockClient {
    fn get(&self, path: &str) -> Result<Value> {
        self.answer(Method::Get, path, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.answer(Method::Post, path, Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_unscripted_is_404() {
        let mock = MockClient::new();
        let err = mock.get("nothing/here").unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_mock_queue_then_sticky() {
        let mock = MockClient::new();
        mock.respond(Method::Get, "a", json!({"n": 1}))
            .respond(Method::Get, "a", json!({"n": 2}));

        assert_eq!(mock.get("a").unwrap(), json!({"n": 1}));
        assert_eq!(mock.get("a").unwrap(), json!({"n": 2}));
        assert_eq!(mock.get("a").unwrap(), json!({"n": 2}));
        assert_eq!(mock.count(Method::Get, "a"), 3);
    }

    #[test]
    fn test_mock_records_post_bodies() {
        let mock = MockClient::new();
        mock.respond(Method::Post, "x/add", json!({"result": "saved"}));

        mock.post("x/add", &json!({"item": {"name": "a"}})).unwrap();
        mock.post("x/add", &json!({"item": {"name": "b"}})).unwrap();

        let posted = mock.posted("x/add");
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[1]["item"]["name"], "b");
        assert_eq!(mock.count(Method::Get, "x/add"), 0);
    }

    #[test]
    fn test_mock_scripted_failure() {
        let mock = MockClient::new();
        mock.fail(Method::Get, "down", Error::connectivity("https://fw/down", "refused"));

        let err = mock.get("down").unwrap_err();
        assert!(matches!(err, Error::Connectivity { .. }));
    }

    #[test]
    fn test_mock_count_prefix_and_clear() {
        let mock = MockClient::new();
        mock.respond(Method::Post, "x/del/1", json!({}));
        mock.respond(Method::Post, "x/del/2", json!({}));
        mock.post("x/del/1", &json!({})).unwrap();
        mock.post("x/del/2", &json!({})).unwrap();

        assert_eq!(mock.count_prefix(Method::Post, "x/del/"), 2);
        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_arc_client_delegates() {
        let mock = Arc::new(MockClient::new());
        mock.respond(Method::Get, "a", json!({"ok": true}));

        let shared: Arc<dyn RemoteClient> = mock.clone();
        assert_eq!(shared.get("a").unwrap(), json!({"ok": true}));
        assert_eq!(mock.count(Method::Get, "a"), 1);
    }
}
