//! Run orchestration: list phase, apply phase, barrier

use crate::context::{Phase, ProgressCallback, RunContext, Targets, with_device_isolation};
use crate::coordinator::BarrierOutcome;
use crate::error::{Error, Result};
use crate::kind::KindRegistry;
use crate::reconciler::Reconciler;
use crate::types::{ApplyResult, ApplySummary, ObservedSet, ResourceIdentity, ResourceSpec};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

type ListKey = (String, String);

/// Options for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Decide and report, but don't write or apply
    pub dry_run: bool,
    /// Threads used for the list phase
    pub jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

/// Outcome for one declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub identity: ResourceIdentity,
    pub result: ApplyResult,
}

/// Everything a run did
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per resource, in the order given
    pub resources: Vec<ResourceReport>,
    pub barrier: Vec<BarrierOutcome>,
    pub summary: ApplySummary,
}

impl RunReport {
    /// Resources that failed and barrier steps that did not apply
    pub fn is_success(&self) -> bool {
        self.summary.is_success() && self.barrier.iter().all(|o| o.status.is_applied())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(|r| !r.result.is_success())
    }
}

/// One reconciliation run
pub struct Run;

impl Run {
    /// Reconcile `resources` against their devices
    ///
    /// Observed state is listed once per kind and device, concurrently.
    /// Resources are then applied one by one in the order given; a failure
    /// is recorded for that resource and never stops the others. Deferred
    /// actions run once at the end.
    pub fn execute(
        registry: &KindRegistry,
        targets: &Targets,
        resources: &[ResourceSpec],
        options: &RunOptions,
        progress: &mut dyn ProgressCallback,
    ) -> Result<RunReport> {
        reject_duplicates(resources)?;

        let ctx = RunContext::new(registry).dry_run(options.dry_run);

        let observed = list_phase(registry, targets, &ctx, resources, options.jobs, progress);

        progress.on_phase_start(Phase::Apply, resources.len());
        let empty = ObservedSet::default();
        let mut report = RunReport::default();
        for resource in resources {
            let identity = &resource.identity;
            progress.on_resource_start(identity);

            let observed = observed
                .get(&(identity.kind.clone(), identity.device.clone()))
                .unwrap_or(&empty);
            let outcome = with_device_isolation(&identity.device, Phase::Apply, || {
                let kind = registry.get(&identity.kind)?;
                let client = targets.client(&identity.device)?;
                Reconciler::new(kind, &ctx).reconcile(client, observed, resource)
            });
            let result = outcome.unwrap_or_else(|e| ApplyResult::Failed {
                error: e.to_string(),
            });

            progress.on_resource_complete(identity, &result);
            report.summary.add_result(&result);
            report.resources.push(ResourceReport {
                identity: identity.clone(),
                result,
            });
        }
        progress.on_phase_complete(Phase::Apply);

        let pending: usize = ctx.coordinators().map(|c| c.pending().len()).sum();
        progress.on_phase_start(Phase::Barrier, pending);
        if options.dry_run {
            ctx.clear();
        } else {
            report.barrier = ctx.run_barrier(targets);
        }
        progress.on_phase_complete(Phase::Barrier);

        Ok(report)
    }
}

fn reject_duplicates(resources: &[ResourceSpec]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for resource in resources {
        if !seen.insert(&resource.identity) {
            return Err(Error::DuplicateResource(resource.identity.to_string()));
        }
    }
    Ok(())
}

/// List each distinct (kind, device) pair once
///
/// Unknown kinds and devices are left out here; they fail per resource in
/// the apply phase.
fn list_phase(
    registry: &KindRegistry,
    targets: &Targets,
    ctx: &RunContext,
    resources: &[ResourceSpec],
    jobs: usize,
    progress: &mut dyn ProgressCallback,
) -> HashMap<ListKey, ObservedSet> {
    let pairs: Vec<ListKey> = resources
        .iter()
        .map(|r| (r.identity.kind.clone(), r.identity.device.clone()))
        .filter(|(kind, device)| registry.contains(kind) && targets.get(device).is_some())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    progress.on_phase_start(Phase::List, pairs.len());

    let list_one = |(kind, device): &ListKey| {
        let observed = with_device_isolation(device, Phase::List, || {
            let client = targets.client(device)?;
            Reconciler::new(registry.get(kind)?, ctx).list(client, device)
        })
        .unwrap_or_default();
        ((kind.clone(), device.clone()), observed)
    };

    let observed: HashMap<ListKey, ObservedSet> = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| pairs.par_iter().map(list_one).collect()),
        Err(e) => {
            log::warn!("cannot start list thread pool, listing sequentially: {e}");
            pairs.iter().map(list_one).collect()
        }
    };

    progress.on_phase_complete(Phase::List);
    observed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::coordinator::BarrierStatus;
    use crate::kind::{DeferredAction, Endpoints, KindSpec};
    use restkit::{Method, MockClient};
    use serde_json::{Value, json};

    const SERVERS: &str = "haproxy/settings/search_servers";
    const BACKENDS: &str = "haproxy/settings/search_backends";
    const CONFIGTEST: &str = "haproxy/service/configtest";
    const RECONFIGURE: &str = "haproxy/service/reconfigure";

    fn registry() -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry.add_action(DeferredAction::new("haproxy", RECONFIGURE).with_precheck(CONFIGTEST));
        registry
            .register(
                KindSpec::collection(
                    "haproxy_server",
                    "server",
                    Endpoints::named("haproxy/settings", "server", "servers"),
                )
                .action("haproxy"),
            )
            .unwrap();
        registry
            .register(
                KindSpec::collection(
                    "haproxy_backend",
                    "backend",
                    Endpoints::named("haproxy/settings", "backend", "backends"),
                )
                .action("haproxy"),
            )
            .unwrap();
        registry
    }

    /// A device that saves every write and passes every pre-check
    fn device(servers: Value) -> MockClient {
        device_with(servers, |_| {})
    }

    /// Like [`device`], with `script` queued ahead of the defaults
    fn device_with(servers: Value, script: impl FnOnce(&MockClient)) -> MockClient {
        let mock = MockClient::new();
        script(&mock);
        mock.respond(Method::Get, SERVERS, json!({ "rows": servers }))
            .respond(Method::Get, BACKENDS, json!({"rows": []}))
            .respond(Method::Post, "haproxy/settings/add_server", json!({"result": "saved"}))
            .respond(Method::Post, "haproxy/settings/add_backend", json!({"result": "saved"}))
            .respond(Method::Get, CONFIGTEST, json!({"result": "Configuration file is valid"}))
            .respond(Method::Post, RECONFIGURE, json!({"status": "ok"}));
        mock
    }

    fn server(device: &str, name: &str) -> ResourceSpec {
        let fields = json!({"address": "10.0.0.1"}).as_object().cloned().unwrap();
        ResourceSpec::present("haproxy_server", device, name, fields)
    }

    fn run(targets: &Targets, resources: &[ResourceSpec], options: &RunOptions) -> RunReport {
        Run::execute(&registry(), targets, resources, options, &mut NoProgress).unwrap()
    }

    #[test]
    fn test_coalesces_across_kinds() {
        let d = device(json!([]));
        let e = device(json!([{"uuid": "e1", "name": "s3", "address": "10.0.0.1"}]));
        let targets = Targets::new().with("d", d.clone()).with("e", e.clone());

        let resources = vec![
            server("d", "s1"),
            server("d", "s2"),
            ResourceSpec::present("haproxy_backend", "d", "pool", Default::default()),
            server("e", "s3"),
        ];
        let report = run(&targets, &resources, &RunOptions::default());

        assert_eq!(report.summary.created, 3);
        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(d.count(Method::Get, CONFIGTEST), 1);
        assert_eq!(d.count(Method::Post, RECONFIGURE), 1);
        assert_eq!(e.count(Method::Get, CONFIGTEST), 0);
        assert_eq!(e.count(Method::Post, RECONFIGURE), 0);
        assert!(report.is_success());
    }

    #[test]
    fn test_failure_gates_only_its_device() {
        let d = device_with(json!([]), |mock| {
            mock.fail(
                Method::Post,
                "haproxy/settings/add_server",
                restkit::Error::transport(500, "internal error"),
            );
        });
        let e = device(json!([]));
        let targets = Targets::new().with("d", d.clone()).with("e", e.clone());

        let resources = vec![
            ResourceSpec::present("haproxy_backend", "d", "pool", Default::default()),
            server("d", "s1"),
            server("e", "s2"),
        ];
        let report = run(&targets, &resources, &RunOptions::default());

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.created, 2);
        assert_eq!(d.count(Method::Post, RECONFIGURE), 0);
        assert_eq!(e.count(Method::Post, RECONFIGURE), 1);
        assert_eq!(
            report
                .barrier
                .iter()
                .map(|o| (o.device.as_str(), o.status.clone()))
                .collect::<Vec<_>>(),
            vec![
                ("d", BarrierStatus::SkippedErrored),
                ("e", BarrierStatus::Applied),
            ]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_failures_are_reported_in_order() {
        let d = device(json!([]));
        let targets = Targets::new().with("d", d);

        let resources = vec![
            server("d", "s1"),
            ResourceSpec::present("nope", "d", "x", Default::default()),
            server("ghost", "s2"),
            server("d", "s3"),
        ];
        let report = run(&targets, &resources, &RunOptions::default());

        let keys: Vec<_> = report.resources.iter().map(|r| r.identity.key.as_str()).collect();
        assert_eq!(keys, vec!["s1", "x", "s2", "s3"]);
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.resources[0].result, ApplyResult::Created);
        assert!(matches!(
            &report.resources[1].result,
            ApplyResult::Failed { error } if error.contains("unknown resource kind")
        ));
        assert!(matches!(
            &report.resources[2].result,
            ApplyResult::Failed { error } if error.contains("unknown device")
        ));
    }

    #[test]
    fn test_list_failure_degrades_per_device() {
        let d = device_with(json!([]), |mock| {
            mock.fail(
                Method::Get,
                SERVERS,
                restkit::Error::connectivity("https://d/api", "connection refused"),
            );
        });
        let e = device(json!([{"uuid": "e1", "name": "s2", "address": "10.0.0.1"}]));
        let targets = Targets::new().with("d", d.clone()).with("e", e.clone());

        let report = run(&targets, &[server("d", "s1"), server("e", "s2")], &RunOptions::default());

        // With nothing observed on d the server is created there.
        assert_eq!(report.resources[0].result, ApplyResult::Created);
        assert_eq!(report.resources[1].result, ApplyResult::NoChange);
        assert_eq!(e.count_prefix(Method::Post, "haproxy/settings/"), 0);
    }

    #[test]
    fn test_duplicates_rejected_before_any_call() {
        let d = device(json!([]));
        let targets = Targets::new().with("d", d.clone());

        let err = Run::execute(
            &registry(),
            &targets,
            &[server("d", "s1"), server("d", "s1")],
            &RunOptions::default(),
            &mut NoProgress,
        )
        .unwrap_err();

        assert!(matches!(err, Error::DuplicateResource(_)));
        assert!(d.calls().is_empty());
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let d = MockClient::new();
        d.respond(Method::Get, SERVERS, json!({"rows": []}))
            .respond(
                Method::Get,
                SERVERS,
                json!({"rows": [{"uuid": "d1", "name": "s1", "address": "10.0.0.1"}]}),
            )
            .respond(Method::Post, "haproxy/settings/add_server", json!({"result": "saved"}))
            .respond(Method::Get, CONFIGTEST, json!({"result": "ok"}))
            .respond(Method::Post, RECONFIGURE, json!({"status": "ok"}));
        let targets = Targets::new().with("d", d.clone());
        let resources = [server("d", "s1")];

        let first = run(&targets, &resources, &RunOptions::default());
        assert_eq!(first.summary.created, 1);
        assert_eq!(first.barrier.len(), 1);

        d.clear_calls();
        let second = run(&targets, &resources, &RunOptions::default());
        assert_eq!(second.summary.unchanged, 1);
        assert!(second.barrier.is_empty());
        assert_eq!(d.count_prefix(Method::Post, ""), 0);
        assert_eq!(d.count(Method::Get, CONFIGTEST), 0);
    }

    #[test]
    fn test_dry_run_makes_no_writes() {
        let d = device(json!([]));
        let targets = Targets::new().with("d", d.clone());
        let options = RunOptions {
            dry_run: true,
            jobs: 2,
        };

        let report = run(&targets, &[server("d", "s1"), server("d", "s2")], &options);

        assert_eq!(report.summary.planned, 2);
        assert!(report.barrier.is_empty());
        assert_eq!(d.count_prefix(Method::Post, ""), 0);
        assert_eq!(d.count(Method::Get, CONFIGTEST), 0);
    }

    #[test]
    fn test_each_pair_listed_once() {
        let d = device(json!([]));
        let targets = Targets::new().with("d", d.clone());

        run(
            &targets,
            &[server("d", "s1"), server("d", "s2"), server("d", "s3")],
            &RunOptions::default(),
        );
        assert_eq!(d.count(Method::Get, SERVERS), 1);
        assert_eq!(d.count(Method::Get, BACKENDS), 0);
    }
}
