//! Per-kind reconciliation: list, match, decide, write
//!
//! One generic [`Reconciler`] serves every kind; the differences between
//! kinds live in their [`KindSpec`].

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::kind::KindSpec;
use crate::policy::field_diffs;
use crate::types::{
    ApplyResult, Ensure, ObservedEntry, ObservedSet, PlannedAction, ResourceIdentity, ResourceSpec,
};
use crate::value::{Fields, normalize_fields, scalar_string};
use restkit::RemoteClient;
use serde_json::{Value, json};

/// Reconciles resources of one kind
pub struct Reconciler<'a> {
    kind: &'a KindSpec,
    ctx: &'a RunContext,
}

impl<'a> Reconciler<'a> {
    pub fn new(kind: &'a KindSpec, ctx: &'a RunContext) -> Self {
        Self { kind, ctx }
    }

    /// Fetch every observed item of this kind on a device in one call
    ///
    /// Relation fields come back translated to names where possible.
    pub fn list(&self, client: &dyn RemoteClient, device: &str) -> Result<ObservedSet> {
        let body = client.get(&self.kind.endpoints.list)?;

        if self.kind.is_singleton() {
            let settings = body
                .get(&self.kind.wrapper)
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    Error::ResponseFormat(format!(
                        "{}: response has no '{}' object",
                        self.kind.endpoints.list, self.kind.wrapper
                    ))
                })?;
            let entry = ObservedEntry {
                remote_id: None,
                key: device.to_string(),
                fields: self.names_for_ids(client, device, settings.clone()),
            };
            return Ok(ObservedSet::new(vec![entry]));
        }

        let rows = body
            .get("rows")
            .and_then(Value::as_array)
            .or_else(|| body.as_array())
            .ok_or_else(|| {
                Error::ResponseFormat(format!("{}: response has no rows", self.kind.endpoints.list))
            })?;

        let entries: Vec<_> = rows
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| {
                let key = row.get(&self.kind.key_field).map(scalar_string)?;
                if key.is_empty() {
                    return None;
                }
                let remote_id = row
                    .get(&self.kind.id_field)
                    .map(scalar_string)
                    .filter(|id| !id.is_empty());
                Some(ObservedEntry {
                    remote_id,
                    key,
                    fields: self.names_for_ids(client, device, row.clone()),
                })
            })
            .collect();

        log::debug!("[{device}] {}: {} observed", self.kind.name, entries.len());
        Ok(ObservedSet::new(entries))
    }

    /// Bring one resource in line with its declaration
    ///
    /// A write marks the kind's deferred action dirty for the device; any
    /// failure marks it errored before the error is returned.
    pub fn reconcile(
        &self,
        client: &dyn RemoteClient,
        observed: &ObservedSet,
        resource: &ResourceSpec,
    ) -> Result<ApplyResult> {
        let result = self.try_reconcile(client, observed, resource);

        if !self.ctx.dry_run {
            let device = &resource.identity.device;
            match &result {
                Ok(r) if r.is_change() => self.ctx.mark_dirty(self.kind, device),
                Err(_) => self.ctx.mark_errored(self.kind, device),
                Ok(_) => {}
            }
        }
        result
    }

    /// Decide what to do without touching the device
    pub fn plan(
        &self,
        client: &dyn RemoteClient,
        observed: &ObservedSet,
        resource: &ResourceSpec,
    ) -> Result<Option<PlannedAction>> {
        let identity = &resource.identity;
        let existing = observed.find(&identity.key);

        match (resource.desired.ensure, existing) {
            (Ensure::Absent, _) if self.kind.is_singleton() => Err(self.unsupported("delete")),
            (Ensure::Present, None) if !self.kind.is_singleton() => Ok(Some(PlannedAction::Create)),
            (Ensure::Present, entry) => {
                // A singleton that could not be read is written in full.
                let unread = Fields::new();
                let have = entry.map_or(&unread, |e| &e.fields);
                let desired = self.comparable(client, identity, &resource.desired.fields);
                let diffs = field_diffs(have, &desired, &self.kind.policy);
                if diffs.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(PlannedAction::Update(diffs)))
                }
            }
            (Ensure::Absent, None) => Ok(None),
            (Ensure::Absent, Some(entry)) => {
                self.check_delete_guard(identity, entry)?;
                Ok(Some(PlannedAction::Delete))
            }
        }
    }

    fn try_reconcile(
        &self,
        client: &dyn RemoteClient,
        observed: &ObservedSet,
        resource: &ResourceSpec,
    ) -> Result<ApplyResult> {
        let identity = &resource.identity;
        let Some(action) = self.plan(client, observed, resource)? else {
            log::debug!("[{}] {} '{}': in sync", identity.device, identity.kind, identity.key);
            return Ok(ApplyResult::NoChange);
        };

        if let PlannedAction::Update(diffs) = &action {
            for diff in diffs {
                log::debug!(
                    "[{}] {} '{}': {} {:?} -> {:?}",
                    identity.device,
                    identity.kind,
                    identity.key,
                    diff.field,
                    diff.observed,
                    diff.desired
                );
            }
        }

        if self.ctx.dry_run {
            log::info!(
                "[{}] {} '{}': would {action}",
                identity.device,
                identity.kind,
                identity.key
            );
            return Ok(ApplyResult::Planned(action));
        }

        let existing = observed.find(&identity.key);
        let result = match action {
            PlannedAction::Create => {
                let path = self.endpoint(self.kind.endpoints.create.as_deref(), "create")?;
                self.write(client, identity, path, &resource.desired.fields, "create")?;
                ApplyResult::Created
            }
            PlannedAction::Update(_) => {
                let base = self.endpoint(self.kind.endpoints.update.as_deref(), "update")?;
                let path = self.kind.item_path(base, self.remote_id(identity, existing)?);
                self.write(client, identity, &path, &resource.desired.fields, "update")?;
                ApplyResult::Modified
            }
            PlannedAction::Delete => {
                let base = self.endpoint(self.kind.endpoints.delete.as_deref(), "delete")?;
                let path = self.kind.item_path(base, self.remote_id(identity, existing)?);
                let response = client.post(&path, &json!({}))?;
                self.expect_marker(identity, &response, &self.kind.markers.deleted, "delete")?;
                ApplyResult::Removed
            }
        };

        log::info!(
            "[{}] {} '{}': {}",
            identity.device,
            identity.kind,
            identity.key,
            match result {
                ApplyResult::Created => "created",
                ApplyResult::Removed => "deleted",
                _ => "updated",
            }
        );
        Ok(result)
    }

    fn write(
        &self,
        client: &dyn RemoteClient,
        identity: &ResourceIdentity,
        path: &str,
        fields: &Fields,
        operation: &str,
    ) -> Result<()> {
        let payload = self.payload(client, identity, fields)?;
        let mut body = Fields::new();
        body.insert(self.kind.wrapper.clone(), Value::Object(payload));
        let response = client.post(path, &Value::Object(body))?;
        self.expect_marker(identity, &response, &self.kind.markers.saved, operation)
    }

    /// Outgoing payload: normalised, key injected, relations as ids
    fn payload(
        &self,
        client: &dyn RemoteClient,
        identity: &ResourceIdentity,
        fields: &Fields,
    ) -> Result<Fields> {
        let mut payload = normalize_fields(fields);
        if !self.kind.is_singleton() {
            payload.insert(
                self.kind.key_field.clone(),
                Value::String(identity.key.clone()),
            );
        }

        for relation in &self.kind.relations {
            let Some(value) = payload.get(&relation.field).map(scalar_string) else {
                continue;
            };
            let ids = self.ctx.resolver.resolve_to_id(
                client,
                &identity.device,
                &relation.endpoint,
                &value,
            )?;
            payload.insert(relation.field.clone(), Value::String(ids));
        }
        Ok(payload)
    }

    /// Declared fields in the shape observed state is listed in
    fn comparable(
        &self,
        client: &dyn RemoteClient,
        identity: &ResourceIdentity,
        fields: &Fields,
    ) -> Fields {
        let mut desired = fields.clone();
        if !self.kind.is_singleton() {
            desired.insert(
                self.kind.key_field.clone(),
                Value::String(identity.key.clone()),
            );
        }
        self.names_for_ids(client, &identity.device, desired)
    }

    fn names_for_ids(&self, client: &dyn RemoteClient, device: &str, mut fields: Fields) -> Fields {
        for relation in &self.kind.relations {
            let Some(value) = fields.get(&relation.field).map(scalar_string) else {
                continue;
            };
            let names = self
                .ctx
                .resolver
                .resolve_to_name(client, device, &relation.endpoint, &value);
            fields.insert(relation.field.clone(), Value::String(names));
        }
        fields
    }

    fn expect_marker(
        &self,
        identity: &ResourceIdentity,
        response: &Value,
        marker: &str,
        operation: &str,
    ) -> Result<()> {
        let confirmed = response
            .as_object()
            .and_then(|body| body.get(&self.kind.markers.field))
            .map(scalar_string)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(marker));

        if confirmed {
            Ok(())
        } else {
            Err(Error::RemoteRejection {
                kind: identity.kind.clone(),
                key: identity.key.clone(),
                operation: operation.to_string(),
                response: response.to_string(),
            })
        }
    }

    fn check_delete_guard(&self, identity: &ResourceIdentity, entry: &ObservedEntry) -> Result<()> {
        let Some(guard) = &self.kind.delete_guard else {
            return Ok(());
        };
        let active = entry
            .fields
            .get(&guard.field)
            .map(scalar_string)
            .is_some_and(|v| v.trim() == guard.value);

        if active {
            return Err(Error::RelationshipConstraint {
                kind: identity.kind.clone(),
                key: identity.key.clone(),
                reason: guard.reason.clone(),
            });
        }
        Ok(())
    }

    fn remote_id<'e>(
        &self,
        identity: &ResourceIdentity,
        existing: Option<&'e ObservedEntry>,
    ) -> Result<Option<&'e str>> {
        if self.kind.is_singleton() {
            return Ok(None);
        }
        existing
            .and_then(|e| e.remote_id.as_deref())
            .map(Some)
            .ok_or_else(|| {
                Error::ResponseFormat(format!(
                    "{identity}: observed item has no '{}'",
                    self.kind.id_field
                ))
            })
    }

    fn endpoint<'p>(&self, path: Option<&'p str>, operation: &str) -> Result<&'p str> {
        path.ok_or_else(|| self.unsupported(operation))
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::UnsupportedOperation {
            kind: self.kind.name.clone(),
            operation: operation.to_string(),
        }
    }
}
