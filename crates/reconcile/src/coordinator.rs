//! Deferred action coordination
//!
//! Reconcilers never call a subsystem's apply endpoint themselves. They mark
//! the device dirty (or errored) on the coordinator of the kind's deferred
//! action, and after every resource of the run has been processed each
//! coordinator runs once: at most one pre-check and one apply per device,
//! however many resources and kinds contributed.

use crate::context::Targets;
use crate::error::Error;
use crate::kind::DeferredAction;
use crate::value::scalar_string;
use restkit::RemoteClient;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Pre-check verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Pass,
    Warning,
    Alert,
}

impl Severity {
    /// Classify pre-check output by case-insensitive substring
    pub fn classify(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("ALERT") {
            Self::Alert
        } else if upper.contains("WARNING") {
            Self::Warning
        } else {
            Self::Pass
        }
    }

    /// Classify a pre-check response body: its `result` field, else the raw body
    pub fn of_response(body: &Value) -> Self {
        Self::classify(&precheck_text(body))
    }
}

fn precheck_text(body: &Value) -> String {
    match body.get("result") {
        Some(result) => scalar_string(result),
        None => scalar_string(body),
    }
}

/// What happened to one device at the barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierStatus {
    Applied,
    AppliedWithWarnings,
    /// Pre-check reported an alert; apply skipped
    SkippedAlert,
    /// A change for this device failed earlier in the run; apply skipped
    SkippedErrored,
    /// The pre-check call itself failed; apply skipped
    PrecheckFailed,
    /// Apply answered without the success marker
    ApplyRejected,
    ApplyFailed,
    /// No client configured for the device
    NoClient,
}

impl BarrierStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied | Self::AppliedWithWarnings)
    }
}

impl fmt::Display for BarrierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Applied => "applied",
            Self::AppliedWithWarnings => "applied with warnings",
            Self::SkippedAlert => "skipped (pre-check alert)",
            Self::SkippedErrored => "skipped (earlier failures)",
            Self::PrecheckFailed => "skipped (pre-check failed)",
            Self::ApplyRejected => "rejected",
            Self::ApplyFailed => "failed",
            Self::NoClient => "no client",
        };
        write!(f, "{text}")
    }
}

/// Barrier result for one action on one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierOutcome {
    pub action: String,
    pub device: String,
    pub status: BarrierStatus,
    /// Pre-check or apply response text, when there is something to say
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
struct Flags {
    dirty: BTreeSet<String>,
    errored: BTreeSet<String>,
}

/// Dirty/errored tracking and the barrier run for one deferred action
#[derive(Debug)]
pub struct Coordinator {
    action: DeferredAction,
    flags: Mutex<Flags>,
}

impl Coordinator {
    pub fn new(action: DeferredAction) -> Self {
        Self {
            action,
            flags: Mutex::new(Flags::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.action.name
    }

    pub fn action(&self) -> &DeferredAction {
        &self.action
    }

    pub fn mark_dirty(&self, device: &str) {
        if self.flags().dirty.insert(device.to_string()) {
            log::debug!("[{device}] {} marked dirty", self.action.name);
        }
    }

    pub fn mark_errored(&self, device: &str) {
        if self.flags().errored.insert(device.to_string()) {
            log::debug!("[{device}] {} marked errored", self.action.name);
        }
    }

    pub fn is_dirty(&self, device: &str) -> bool {
        self.flags().dirty.contains(device)
    }

    pub fn is_errored(&self, device: &str) -> bool {
        self.flags().errored.contains(device)
    }

    /// Devices awaiting the deferred action, sorted
    pub fn pending(&self) -> Vec<String> {
        self.flags().dirty.iter().cloned().collect()
    }

    /// Drop every flag
    pub fn clear(&self) {
        let mut flags = self.flags();
        flags.dirty.clear();
        flags.errored.clear();
    }

    /// Pre-check and apply once per dirty device, then clear all flags
    ///
    /// Failures are logged and reported in the outcomes, never raised.
    pub fn run(&self, targets: &Targets) -> Vec<BarrierOutcome> {
        // Take the flags up front so they are cleared whatever happens below.
        let Flags { dirty, errored } = std::mem::take(&mut *self.flags());

        dirty
            .iter()
            .map(|device| {
                let (status, detail) = match targets.get(device) {
                    None => {
                        log::error!("[{device}] {}: no client, cannot apply", self.action.name);
                        (BarrierStatus::NoClient, None)
                    }
                    Some(_) if errored.contains(device) => {
                        log::error!(
                            "[{device}] {}: apply suppressed, changes on this device failed earlier",
                            self.action.name
                        );
                        (BarrierStatus::SkippedErrored, None)
                    }
                    Some(client) => self.run_device(client, device),
                };
                BarrierOutcome {
                    action: self.action.name.clone(),
                    device: device.clone(),
                    status,
                    detail,
                }
            })
            .collect()
    }

    fn run_device(
        &self,
        client: &dyn RemoteClient,
        device: &str,
    ) -> (BarrierStatus, Option<String>) {
        let name = &self.action.name;
        let mut warned = None;

        if let Some(precheck) = &self.action.precheck {
            let body = match client.get(precheck) {
                Ok(body) => body,
                Err(e) => {
                    log::error!("[{device}] {name}: pre-check failed, apply skipped: {e}");
                    return (BarrierStatus::PrecheckFailed, Some(e.to_string()));
                }
            };
            let text = precheck_text(&body);
            match Severity::of_response(&body) {
                Severity::Alert => {
                    let alert = Error::ConfigValidationAlert {
                        action: name.clone(),
                        device: device.to_string(),
                        message: text.trim().to_string(),
                    };
                    log::error!("[{device}] {alert}; apply skipped");
                    return (BarrierStatus::SkippedAlert, Some(text));
                }
                Severity::Warning => {
                    log::warn!("[{device}] {name}: pre-check warning: {}", text.trim());
                    warned = Some(text);
                }
                Severity::Pass => log::info!("[{device}] {name}: pre-check passed"),
            }
        }

        match client.post(&self.action.apply, &json!({})) {
            Ok(body) if self.apply_succeeded(&body) => {
                log::info!("[{device}] {name}: applied");
                let status = if warned.is_some() {
                    BarrierStatus::AppliedWithWarnings
                } else {
                    BarrierStatus::Applied
                };
                (status, warned)
            }
            Ok(body) => {
                log::warn!("[{device}] {name}: apply not confirmed: {body}");
                (BarrierStatus::ApplyRejected, Some(body.to_string()))
            }
            Err(e) => {
                log::error!("[{device}] {name}: apply failed: {e}");
                (BarrierStatus::ApplyFailed, Some(e.to_string()))
            }
        }
    }

    fn apply_succeeded(&self, body: &Value) -> bool {
        body.get(&self.action.status_field)
            .map(scalar_string)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(&self.action.status_marker))
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        match self.flags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restkit::{Method, MockClient};

    const CONFIGTEST: &str = "haproxy/service/configtest";
    const RECONFIGURE: &str = "haproxy/service/reconfigure";

    fn coordinator() -> Coordinator {
        Coordinator::new(DeferredAction::new("haproxy", RECONFIGURE).with_precheck(CONFIGTEST))
    }

    fn device(precheck: &str) -> MockClient {
        let mock = MockClient::new();
        mock.respond(Method::Get, CONFIGTEST, json!({ "result": precheck }))
            .respond(Method::Post, RECONFIGURE, json!({"status": "ok"}));
        mock
    }

    #[test]
    fn test_classify() {
        assert_eq!(Severity::classify("Configuration file is valid"), Severity::Pass);
        assert_eq!(Severity::classify("[WARNING] 1 backend has no server"), Severity::Warning);
        assert_eq!(Severity::classify("[ALERT] parsing error"), Severity::Alert);
        assert_eq!(Severity::classify("alert wins over warning"), Severity::Alert);
        assert_eq!(Severity::of_response(&json!("[WARNING] raw text")), Severity::Warning);
        assert_eq!(Severity::of_response(&json!({"other": "ALERT"})), Severity::Alert);
    }

    #[test]
    fn test_marks_are_idempotent() {
        let c = coordinator();
        c.mark_dirty("fw1");
        c.mark_dirty("fw1");
        c.mark_dirty("fw2");
        assert_eq!(c.pending(), vec!["fw1".to_string(), "fw2".to_string()]);
    }

    #[test]
    fn test_coalesces_to_one_call_per_dirty_device() {
        let d = device("ok");
        let e = device("ok");
        let targets = Targets::new().with("d", d.clone()).with("e", e.clone());
        let c = coordinator();

        for _ in 0..3 {
            c.mark_dirty("d");
        }
        let outcomes = c.run(&targets);

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, BarrierStatus::Applied);
        assert_eq!(d.count(Method::Get, CONFIGTEST), 1);
        assert_eq!(d.count(Method::Post, RECONFIGURE), 1);
        assert!(e.calls().is_empty());
    }

    #[test]
    fn test_errored_device_is_skipped() {
        let d = device("ok");
        let e = device("ok");
        let targets = Targets::new().with("d", d.clone()).with("e", e.clone());
        let c = coordinator();

        c.mark_dirty("d");
        c.mark_errored("d");
        c.mark_dirty("e");
        let outcomes = c.run(&targets);

        assert_eq!(outcomes[0].status, BarrierStatus::SkippedErrored);
        assert_eq!(d.count(Method::Post, RECONFIGURE), 0);
        assert_eq!(d.count(Method::Get, CONFIGTEST), 0);
        assert_eq!(e.count(Method::Post, RECONFIGURE), 1);
    }

    static LOGGED: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());

    /// Keeps every log line so tests can check what the operator is told
    struct CaptureLog;

    impl log::Log for CaptureLog {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            LOGGED
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    /// Info and louder levels logged for one device; tests run in parallel so each uses its own
    fn levels_logged(device: &str) -> Vec<log::Level> {
        let prefix = format!("[{device}]");
        LOGGED
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, line)| *level <= log::Level::Info && line.starts_with(&prefix))
            .map(|(level, _)| *level)
            .collect()
    }

    fn capture_logs() {
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            log::set_logger(&CaptureLog).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });
    }

    #[test]
    fn test_severity_gating() {
        capture_logs();
        for (name, text, applies, status, level) in [
            ("gate-alert", "[ALERT] config broken", 0, BarrierStatus::SkippedAlert, log::Level::Error),
            (
                "gate-warning",
                "[WARNING] unused backend",
                1,
                BarrierStatus::AppliedWithWarnings,
                log::Level::Warn,
            ),
            ("gate-pass", "Configuration file is valid", 1, BarrierStatus::Applied, log::Level::Info),
        ] {
            let d = device(text);
            let targets = Targets::new().with(name, d.clone());
            let c = coordinator();
            c.mark_dirty(name);

            let outcomes = c.run(&targets);
            assert_eq!(outcomes[0].status, status, "{text}");
            assert_eq!(d.count(Method::Post, RECONFIGURE), applies, "{text}");

            // The first line is the pre-check verdict.
            let levels = levels_logged(name);
            assert_eq!(levels.first(), Some(&level), "{text}");
            assert!(!levels[1..].contains(&log::Level::Warn), "{text}");
        }
    }

    #[test]
    fn test_failed_precheck_skips_apply() {
        let d = MockClient::new();
        d.fail(Method::Get, CONFIGTEST, restkit::Error::transport(500, "oops"));
        let targets = Targets::new().with("d", d.clone());
        let c = coordinator();
        c.mark_dirty("d");

        let outcomes = c.run(&targets);
        assert_eq!(outcomes[0].status, BarrierStatus::PrecheckFailed);
        assert_eq!(d.count(Method::Post, RECONFIGURE), 0);
        assert!(!c.is_dirty("d"));
    }

    #[test]
    fn test_apply_without_marker_or_failing_is_not_raised() {
        let rejected = MockClient::new();
        rejected.respond(Method::Post, "routing/settings/reconfigure", json!({"status": "failed"}));
        let broken = MockClient::new();
        broken.fail(
            Method::Post,
            "routing/settings/reconfigure",
            restkit::Error::connectivity("https://b", "timeout"),
        );
        let targets = Targets::new()
            .with("a", rejected)
            .with("b", broken)
            .with("c", {
                let ok = MockClient::new();
                ok.respond(Method::Post, "routing/settings/reconfigure", json!({"status": " OK "}));
                ok
            });

        let c = Coordinator::new(DeferredAction::new("routing", "routing/settings/reconfigure"));
        for device in ["a", "b", "c", "missing"] {
            c.mark_dirty(device);
        }

        let statuses: Vec<_> = c.run(&targets).into_iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                BarrierStatus::ApplyRejected,
                BarrierStatus::ApplyFailed,
                BarrierStatus::Applied,
                BarrierStatus::NoClient,
            ]
        );
    }

    #[test]
    fn test_run_clears_flags() {
        let d = device("ok");
        let targets = Targets::new().with("d", d.clone());
        let c = coordinator();

        c.mark_dirty("d");
        c.mark_errored("d");
        c.run(&targets);
        assert!(!c.is_dirty("d"));
        assert!(!c.is_errored("d"));

        d.clear_calls();
        assert!(c.run(&targets).is_empty());
        assert!(d.calls().is_empty());
    }
}
