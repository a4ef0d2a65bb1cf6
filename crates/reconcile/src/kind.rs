//! Resource kind definitions
//!
//! A kind is described by data, not code: where to list, create, update and
//! delete items, how the payload is wrapped, which field carries the business
//! key, how to compare, which fields reference other kinds, and which
//! deferred action its changes feed. Every concrete kind is one [`KindSpec`]
//! value registered in a [`KindRegistry`].

use crate::error::{Error, Result};
use crate::policy::ComparisonPolicy;
use crate::relation::RelationEndpoint;
use std::collections::BTreeMap;

/// Whether a kind holds many keyed items or exactly one settings object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Items listed from a `rows` array and addressed by remote id
    Collection,
    /// One settings object per device, keyed by the device name
    Singleton,
}

/// API paths for one kind
///
/// `update` and `delete` get `/{remote_id}` appended for collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub list: String,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

impl Endpoints {
    pub fn new(list: &str, create: &str, update: &str, delete: &str) -> Self {
        Self {
            list: list.to_string(),
            create: Some(create.to_string()),
            update: Some(update.to_string()),
            delete: Some(delete.to_string()),
        }
    }

    /// Conventional item endpoints under a controller base path
    pub fn items(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            list: format!("{base}/search_item"),
            create: Some(format!("{base}/add_item")),
            update: Some(format!("{base}/set_item")),
            delete: Some(format!("{base}/del_item")),
        }
    }

    /// Endpoints named after an item noun, e.g. `search_servers`, `add_server`
    pub fn named(base: &str, singular: &str, plural: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            list: format!("{base}/search_{plural}"),
            create: Some(format!("{base}/add_{singular}")),
            update: Some(format!("{base}/set_{singular}")),
            delete: Some(format!("{base}/del_{singular}")),
        }
    }
}

/// A field whose value names an item of another kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationField {
    pub field: String,
    pub endpoint: RelationEndpoint,
}

/// Deletion is refused while an observed field holds a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGuard {
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Expected success markers in write responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub field: String,
    pub saved: String,
    pub deleted: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            field: "result".to_string(),
            saved: "saved".to_string(),
            deleted: "deleted".to_string(),
        }
    }
}

/// Declarative description of one resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSpec {
    pub name: String,
    pub shape: Shape,
    /// Key wrapping the payload, e.g. `{"alias": {...}}`
    pub wrapper: String,
    /// Payload field holding the business key
    pub key_field: String,
    /// Row field holding the remote id
    pub id_field: String,
    pub endpoints: Endpoints,
    pub policy: ComparisonPolicy,
    pub relations: Vec<RelationField>,
    pub delete_guard: Option<DeleteGuard>,
    /// Deferred action group dirtied by changes of this kind
    pub action: Option<String>,
    pub markers: Markers,
}

impl KindSpec {
    /// A keyed collection kind
    pub fn collection(name: &str, wrapper: &str, endpoints: Endpoints) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Collection,
            wrapper: wrapper.to_string(),
            key_field: "name".to_string(),
            id_field: "uuid".to_string(),
            endpoints,
            policy: ComparisonPolicy::exact().ignore("uuid"),
            relations: Vec::new(),
            delete_guard: None,
            action: None,
            markers: Markers::default(),
        }
    }

    /// A per-device settings kind read from `get` and written to `set`
    pub fn singleton(name: &str, wrapper: &str, get: &str, set: &str) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Singleton,
            wrapper: wrapper.to_string(),
            key_field: String::new(),
            id_field: String::new(),
            endpoints: Endpoints {
                list: get.to_string(),
                create: None,
                update: Some(set.to_string()),
                delete: None,
            },
            policy: ComparisonPolicy::deep_subset(),
            relations: Vec::new(),
            delete_guard: None,
            action: None,
            markers: Markers::default(),
        }
    }

    pub fn key_field(mut self, field: &str) -> Self {
        self.key_field = field.to_string();
        self
    }

    pub fn policy(mut self, policy: ComparisonPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn relation(mut self, field: &str, endpoint: RelationEndpoint) -> Self {
        self.relations.push(RelationField {
            field: field.to_string(),
            endpoint,
        });
        self
    }

    pub fn delete_guard(mut self, field: &str, value: &str, reason: &str) -> Self {
        self.delete_guard = Some(DeleteGuard {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
        self
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.shape == Shape::Singleton
    }

    /// Path for an update or delete call
    pub fn item_path(&self, base: &str, remote_id: Option<&str>) -> String {
        match (self.shape, remote_id) {
            (Shape::Collection, Some(id)) => format!("{}/{}", base.trim_end_matches('/'), id),
            _ => base.to_string(),
        }
    }
}

/// A coalesced apply call, optionally gated by a pre-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAction {
    pub name: String,
    pub precheck: Option<String>,
    pub apply: String,
    /// Response field checked after the apply call
    pub status_field: String,
    pub status_marker: String,
}

impl DeferredAction {
    pub fn new(name: &str, apply: &str) -> Self {
        Self {
            name: name.to_string(),
            precheck: None,
            apply: apply.to_string(),
            status_field: "status".to_string(),
            status_marker: "ok".to_string(),
        }
    }

    pub fn with_precheck(mut self, path: &str) -> Self {
        self.precheck = Some(path.to_string());
        self
    }
}

/// Kind and deferred-action lookup table
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, KindSpec>,
    actions: BTreeMap<String, DeferredAction>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deferred action; a later registration replaces an earlier one
    pub fn add_action(&mut self, action: DeferredAction) {
        self.actions.insert(action.name.clone(), action);
    }

    /// Register a kind; its deferred action must already be registered
    pub fn register(&mut self, kind: KindSpec) -> Result<()> {
        if let Some(action) = &kind.action
            && !self.actions.contains_key(action)
        {
            return Err(Error::UnknownAction {
                kind: kind.name.clone(),
                action: action.clone(),
            });
        }
        self.kinds.insert(kind.name.clone(), kind);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<&KindSpec> {
        self.kinds
            .get(kind)
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }

    pub fn action(&self, name: &str) -> Option<&DeferredAction> {
        self.actions.get(name)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindSpec> {
        self.kinds.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &DeferredAction> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
