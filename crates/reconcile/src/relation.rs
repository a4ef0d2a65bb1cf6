//! Name ↔ id translation for cross-references between kinds
//!
//! Declarations refer to other items by name ("web-backend"); the appliance
//! stores opaque ids. The resolver keeps one bidirectional map per
//! `(device, endpoint)`, filled lazily by a single list call and shared by
//! every field that points at the same endpoint.
//!
//! Forward resolution (name → id) is strict: a miss forces exactly one
//! refresh and then fails. Reverse resolution (id → name) is lenient: a miss
//! returns the raw value so listing observed state never blocks on it.

use crate::error::{Error, Result};
use crate::value::{scalar_string, split_list};
use regex::Regex;
use restkit::RemoteClient;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

static ID_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("identifier pattern is valid")
});

/// Check whether a value already has the shape of a remote identifier
pub fn is_identifier(value: &str) -> bool {
    ID_SHAPE.is_match(value)
}

/// The list endpoint a relation field points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationEndpoint {
    pub path: String,
    pub id_field: String,
    pub name_field: String,
}

impl RelationEndpoint {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            id_field: "uuid".to_string(),
            name_field: "name".to_string(),
        }
    }

    pub fn name_field(mut self, field: &str) -> Self {
        self.name_field = field.to_string();
        self
    }
}

impl fmt::Display for RelationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    Missing,
}

#[derive(Debug, Default)]
struct RelationMap {
    id_to_name: HashMap<String, String>,
    name_to_id: HashMap<String, String>,
}

impl RelationMap {
    fn from_body(body: &Value, endpoint: &RelationEndpoint) -> Self {
        let rows = body
            .get("rows")
            .and_then(Value::as_array)
            .or_else(|| body.as_array());

        let mut map = Self::default();
        for row in rows.into_iter().flatten() {
            let id = row.get(&endpoint.id_field).map(scalar_string).unwrap_or_default();
            let name = row.get(&endpoint.name_field).map(scalar_string).unwrap_or_default();
            if id.is_empty() || name.is_empty() {
                continue;
            }
            map.name_to_id.entry(name.clone()).or_insert_with(|| id.clone());
            map.id_to_name.entry(id).or_insert(name);
        }
        map
    }
}

type Slot = Arc<Mutex<Option<RelationMap>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Per-run relation cache
///
/// Each `(device, endpoint)` slot has its own lock, held while the slot is
/// filled, so concurrent callers populate it at most once.
#[derive(Debug, Default)]
pub struct RelationResolver {
    slots: Mutex<HashMap<(String, RelationEndpoint), Slot>>,
    fetches: AtomicUsize,
}

impl RelationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of list calls issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Translate a (possibly comma-separated) name value to ids
    pub fn resolve_to_id(
        &self,
        client: &dyn RemoteClient,
        device: &str,
        endpoint: &RelationEndpoint,
        value: &str,
    ) -> Result<String> {
        let mut ids = Vec::new();
        for element in split_list(value) {
            if is_identifier(element) {
                ids.push(element.to_string());
            } else {
                ids.push(self.id_for(client, device, endpoint, element)?);
            }
        }
        Ok(ids.join(","))
    }

    /// Translate a (possibly comma-separated) id value to names, keeping
    /// unknown ids as they are
    pub fn resolve_to_name(
        &self,
        client: &dyn RemoteClient,
        device: &str,
        endpoint: &RelationEndpoint,
        value: &str,
    ) -> String {
        split_list(value)
            .into_iter()
            .map(|element| {
                let found = self.lookup(client, device, endpoint, |m| {
                    m.id_to_name.get(element).cloned()
                });
                match found {
                    Ok(Lookup::Found(name)) => name,
                    Ok(Lookup::Missing) => element.to_string(),
                    Err(e) => {
                        log::warn!("[{device}] cannot list {endpoint} for name lookup: {e}");
                        self.remember_empty(device, endpoint);
                        element.to_string()
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn id_for(
        &self,
        client: &dyn RemoteClient,
        device: &str,
        endpoint: &RelationEndpoint,
        name: &str,
    ) -> Result<String> {
        let by_name = |m: &RelationMap| m.name_to_id.get(name).cloned();

        if let Lookup::Found(id) = self.lookup(client, device, endpoint, by_name)? {
            return Ok(id);
        }

        log::debug!("[{device}] '{name}' not cached for {endpoint}, refreshing");
        self.invalidate(device, endpoint);

        match self.lookup(client, device, endpoint, by_name)? {
            Lookup::Found(id) => Ok(id),
            Lookup::Missing => Err(Error::RelationResolution {
                value: name.to_string(),
                endpoint: endpoint.path.clone(),
                device: device.to_string(),
            }),
        }
    }

    fn slot(&self, device: &str, endpoint: &RelationEndpoint) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(
            slots
                .entry((device.to_string(), endpoint.clone()))
                .or_default(),
        )
    }

    fn lookup<F>(
        &self,
        client: &dyn RemoteClient,
        device: &str,
        endpoint: &RelationEndpoint,
        find: F,
    ) -> Result<Lookup>
    where
        F: Fn(&RelationMap) -> Option<String>,
    {
        let slot = self.slot(device, endpoint);
        let mut cached = lock(&slot);

        if cached.is_none() {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let body = client.get(&endpoint.path)?;
            let map = RelationMap::from_body(&body, endpoint);
            log::debug!(
                "[{device}] cached {} entries from {endpoint}",
                map.name_to_id.len()
            );
            *cached = Some(map);
        }

        Ok(match cached.as_ref().and_then(find) {
            Some(value) => Lookup::Found(value),
            None => Lookup::Missing,
        })
    }

    fn invalidate(&self, device: &str, endpoint: &RelationEndpoint) {
        *lock(&self.slot(device, endpoint)) = None;
    }

    fn remember_empty(&self, device: &str, endpoint: &RelationEndpoint) {
        let slot = self.slot(device, endpoint);
        let mut cached = lock(&slot);
        if cached.is_none() {
            *cached = Some(RelationMap::default());
        }
    }
}
