//! Run-scoped state and caller-facing hooks
//!
//! A [`RunContext`] owns the dirty/errored flags and the relation cache for
//! exactly one run. It is built fresh by [`RunContext::new`] and dropped when
//! the run ends, so nothing leaks from one run into the next.

use crate::coordinator::{BarrierOutcome, Coordinator};
use crate::error::{Error, Result};
use crate::kind::{KindRegistry, KindSpec};
use crate::relation::RelationResolver;
use crate::types::{ApplyResult, ResourceIdentity};
use restkit::RemoteClient;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Remote clients by device name
#[derive(Clone, Default)]
pub struct Targets {
    clients: BTreeMap<String, Arc<dyn RemoteClient>>,
}

impl Targets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: &str, client: Arc<dyn RemoteClient>) {
        self.clients.insert(device.to_string(), client);
    }

    /// Builder form of [`Targets::insert`]
    pub fn with(mut self, device: &str, client: impl RemoteClient + 'static) -> Self {
        self.insert(device, Arc::new(client));
        self
    }

    pub fn get(&self, device: &str) -> Option<&dyn RemoteClient> {
        self.clients.get(device).map(|client| &**client)
    }

    /// Client for a device, or `UnknownDevice`
    pub fn client(&self, device: &str) -> Result<&dyn RemoteClient> {
        self.get(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl fmt::Debug for Targets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clients.keys()).finish()
    }
}

/// Run phase, used for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    List,
    Apply,
    Barrier,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Apply => write!(f, "apply"),
            Self::Barrier => write!(f, "barrier"),
        }
    }
}

/// Run `f` for one device and log its failure with device and phase context
///
/// List failures are warnings (the run degrades to an empty observed set),
/// everything else is an error. The result is returned unchanged so the
/// caller decides how to degrade.
pub fn with_device_isolation<T, F>(device: &str, phase: Phase, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let result = f();
    if let Err(e) = &result {
        match phase {
            Phase::List => log::warn!("[{device}] {phase} failed: {e}"),
            Phase::Apply | Phase::Barrier => log::error!("[{device}] {phase} failed: {e}"),
        }
    }
    result
}

/// Per-run state shared by every reconciler
#[derive(Debug)]
pub struct RunContext {
    pub resolver: RelationResolver,
    coordinators: BTreeMap<String, Coordinator>,
    pub dry_run: bool,
}

impl RunContext {
    /// Fresh context with one coordinator per registered deferred action
    pub fn new(registry: &KindRegistry) -> Self {
        let coordinators = registry
            .actions()
            .map(|action| (action.name.clone(), Coordinator::new(action.clone())))
            .collect();

        Self {
            resolver: RelationResolver::new(),
            coordinators,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn coordinator(&self, action: &str) -> Option<&Coordinator> {
        self.coordinators.get(action)
    }

    pub fn coordinators(&self) -> impl Iterator<Item = &Coordinator> {
        self.coordinators.values()
    }

    /// Mark the kind's deferred action dirty for a device
    pub fn mark_dirty(&self, kind: &KindSpec, device: &str) {
        if let Some(coordinator) = self.coordinator_for(kind) {
            coordinator.mark_dirty(device);
        }
    }

    /// Mark the kind's deferred action errored for a device
    pub fn mark_errored(&self, kind: &KindSpec, device: &str) {
        if let Some(coordinator) = self.coordinator_for(kind) {
            coordinator.mark_errored(device);
        }
    }

    /// Run every coordinator once
    pub fn run_barrier(&self, targets: &Targets) -> Vec<BarrierOutcome> {
        self.coordinators
            .values()
            .flat_map(|c| c.run(targets))
            .collect()
    }

    /// Drop all flags without calling the device
    pub fn clear(&self) {
        for coordinator in self.coordinators.values() {
            coordinator.clear();
        }
    }

    fn coordinator_for(&self, kind: &KindSpec) -> Option<&Coordinator> {
        kind.action.as_deref().and_then(|a| self.coordinators.get(a))
    }
}

/// Progress callback for a run
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before a phase starts with the number of units in it
    fn on_phase_start(&mut self, phase: Phase, count: usize);

    /// Called when a resource starts applying
    fn on_resource_start(&mut self, identity: &ResourceIdentity);

    /// Called when a resource finishes
    fn on_resource_complete(&mut self, identity: &ResourceIdentity, result: &ApplyResult);

    fn on_phase_complete(&mut self, phase: Phase);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _phase: Phase, _count: usize) {}
    fn on_resource_start(&mut self, _identity: &ResourceIdentity) {}
    fn on_resource_complete(&mut self, _identity: &ResourceIdentity, _result: &ApplyResult) {}
    fn on_phase_complete(&mut self, _phase: Phase) {}
}
