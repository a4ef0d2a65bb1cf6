//! Progress indicators for restsync runs
//!
//! The list and barrier phases are a spinner (their work happens on worker
//! threads or is a handful of calls); the apply phase is a bar with one tick
//! per declared resource.

use crate::ui::plural;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ApplyResult, Phase, ProgressCallback, ResourceIdentity};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// Terminal progress for [`reconcile::Run`]
pub struct RunProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl RunProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn start(phase: Phase, count: usize) -> ProgressBar {
        match phase {
            Phase::Apply => {
                let pb = ProgressBar::new(count as u64);
                pb.set_style(style(BAR_TEMPLATE, ProgressStyle::default_bar()).progress_chars("=>-"));
                pb
            }
            Phase::List | Phase::Barrier => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner()));
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message(phase_message(phase, count));
                pb
            }
        }
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

fn phase_message(phase: Phase, count: usize) -> String {
    match phase {
        Phase::List => format!("Reading {}...", plural(count, "kind/device pair")),
        Phase::Apply => format!("Reconciling {}...", plural(count, "resource")),
        Phase::Barrier => format!("Running {}...", plural(count, "deferred action")),
    }
}

impl ProgressCallback for RunProgress {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        if let Some(previous) = self.bar.take() {
            previous.finish_and_clear();
        }
        if self.quiet || count == 0 {
            return;
        }
        self.bar = Some(Self::start(phase, count));
    }

    fn on_resource_start(&mut self, identity: &ResourceIdentity) {
        if let Some(pb) = &self.bar {
            pb.set_message(identity.to_string());
        }
    }

    fn on_resource_complete(&mut self, identity: &ResourceIdentity, result: &ApplyResult) {
        let Some(pb) = &self.bar else {
            return;
        };
        if let ApplyResult::Failed { error } = result {
            pb.suspend(|| println!("  {} {} ({})", "✗".red(), identity, error));
        }
        pb.set_message(format!("{} {}", result.symbol(), identity));
        pb.inc(1);
    }

    fn on_phase_complete(&mut self, _phase: Phase) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_never_creates_a_bar() {
        let mut progress = RunProgress::new(true);
        progress.on_phase_start(Phase::Apply, 3);
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_empty_phase_has_no_bar() {
        let mut progress = RunProgress::new(false);
        progress.on_phase_start(Phase::Barrier, 0);
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_apply_bar_counts_resources() {
        let mut progress = RunProgress::new(false);
        progress.on_phase_start(Phase::Apply, 2);

        let identity = ResourceIdentity::new("gateway", "fw1", "WAN_GW");
        progress.on_resource_start(&identity);
        progress.on_resource_complete(&identity, &ApplyResult::Created);
        assert_eq!(progress.bar.as_ref().map(ProgressBar::position), Some(1));

        progress.on_phase_complete(Phase::Apply);
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_phase_messages() {
        assert_eq!(
            phase_message(Phase::List, 3),
            "Reading 3 kind/device pairs..."
        );
        assert_eq!(
            phase_message(Phase::Barrier, 1),
            "Running 1 deferred action..."
        );
    }
}
