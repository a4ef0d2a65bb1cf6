//! # Reconcile
//!
//! Converge configuration objects on REST-configured appliances.
//!
//! Declared resources are matched against observed state by business key,
//! compared under a per-kind policy, and created, updated or deleted as
//! needed. Changes never trigger a subsystem's apply call directly; they mark
//! a deferred action dirty, and each dirty device gets at most one pre-check
//! and one apply call once every resource of the run has been processed.
//!
//! ## Core Concepts
//!
//! - **KindSpec**: table row describing one resource kind (endpoints,
//!   payload wrapper, comparison policy, relations, deferred action)
//! - **Reconciler**: lists, compares and writes resources of one kind
//! - **RelationResolver**: run-scoped name ↔ id cache for cross-references
//! - **Coordinator**: dirty/errored flags and the barrier run for one
//!   deferred action
//! - **RunContext**: the run-scoped state above, fresh for every run
//! - **Run**: list phase, apply phase, barrier
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     DeferredAction, Endpoints, KindRegistry, KindSpec, NoProgress, ResourceSpec, Run,
//!     RunOptions, Targets,
//! };
//! use restkit::{Method, MockClient};
//! use serde_json::json;
//!
//! let mut registry = KindRegistry::new();
//! registry.add_action(DeferredAction::new("alias", "firewall/alias/reconfigure"));
//! registry
//!     .register(
//!         KindSpec::collection("firewall_alias", "alias", Endpoints::items("firewall/alias"))
//!             .action("alias"),
//!     )
//!     .unwrap();
//!
//! let fw1 = MockClient::new();
//! fw1.respond(Method::Get, "firewall/alias/search_item", json!({"rows": []}))
//!     .respond(Method::Post, "firewall/alias/add_item", json!({"result": "saved"}))
//!     .respond(Method::Post, "firewall/alias/reconfigure", json!({"status": "ok"}));
//! let targets = Targets::new().with("fw1", fw1.clone());
//!
//! let fields = json!({"type": "host", "content": ["10.0.0.1"]});
//! let resources = [ResourceSpec::present(
//!     "firewall_alias",
//!     "fw1",
//!     "webservers",
//!     fields.as_object().cloned().unwrap(),
//! )];
//!
//! let report = Run::execute(&registry, &targets, &resources, &RunOptions::default(), &mut NoProgress)
//!     .unwrap();
//! assert_eq!(report.summary.created, 1);
//! assert_eq!(fw1.count(Method::Post, "firewall/alias/reconfigure"), 1);
//! ```

pub mod context;
pub mod coordinator;
pub mod error;
pub mod kind;
pub mod policy;
pub mod reconciler;
pub mod relation;
pub mod run;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use context::{NoProgress, Phase, ProgressCallback, RunContext, Targets, with_device_isolation};
pub use coordinator::{BarrierOutcome, BarrierStatus, Coordinator, Severity};
pub use error::{Error, Result};
pub use kind::{DeferredAction, DeleteGuard, Endpoints, KindRegistry, KindSpec, Markers, RelationField, Shape};
pub use policy::{ComparisonPolicy, FieldDiff, MatchMode, field_diffs, in_sync};
pub use reconciler::Reconciler;
pub use relation::{Lookup, RelationEndpoint, RelationResolver, is_identifier};
pub use run::{ResourceReport, Run, RunOptions, RunReport};
pub use types::{
    ApplyResult, ApplySummary, DesiredState, Ensure, ObservedEntry, ObservedSet, PlannedAction,
    ResourceIdentity, ResourceSpec,
};
pub use value::Fields;
