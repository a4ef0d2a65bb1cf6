//! `restsync plan` - preview what apply would change

use anyhow::Result;
use colored::Colorize;
use reconcile::{ApplyResult, KindRegistry, PlannedAction, RunReport};
use std::collections::BTreeSet;

use crate::Context;
use crate::cli::SelectArgs;
use crate::ui;

/// What a dry run found
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PlanCounts {
    pub fn of(report: &RunReport) -> Self {
        let mut counts = Self::default();
        for resource in &report.resources {
            match &resource.result {
                ApplyResult::Planned(PlannedAction::Create) | ApplyResult::Created => {
                    counts.create += 1;
                }
                ApplyResult::Planned(PlannedAction::Update(_)) | ApplyResult::Modified => {
                    counts.update += 1;
                }
                ApplyResult::Planned(PlannedAction::Delete) | ApplyResult::Removed => {
                    counts.delete += 1;
                }
                ApplyResult::NoChange => counts.unchanged += 1,
                ApplyResult::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn changes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

pub fn run(ctx: &Context, args: &SelectArgs) -> Result<()> {
    let ws = super::load(ctx, args)?;
    if ws.resources.is_empty() {
        ui::info("No resources selected");
        return Ok(());
    }

    let report = super::execute(ctx, &ws, true, args.jobs)?;
    ui::header("Plan");
    print_plan(&report, &ws.registry, ctx.verbose > 0);
    Ok(())
}

/// Print planned changes per device and return the counts
pub fn print_plan(report: &RunReport, registry: &KindRegistry, show_unchanged: bool) -> PlanCounts {
    let counts = PlanCounts::of(report);

    let mut device = None;
    for resource in &report.resources {
        let identity = &resource.identity;
        if matches!(resource.result, ApplyResult::NoChange) && !show_unchanged {
            continue;
        }
        if device != Some(identity.device.as_str()) {
            ui::section(&identity.device);
            device = Some(identity.device.as_str());
        }

        let label = format!("{} {}", identity.kind.dimmed(), identity.key);
        match &resource.result {
            ApplyResult::Planned(action) => {
                println!("  {} {} ({})", ui::plan_symbol(action), label, action);
                if let PlannedAction::Update(diffs) = action {
                    for diff in diffs {
                        ui::dim(&format!(
                            "    {}: {} → {}",
                            diff.field,
                            diff.observed.as_deref().unwrap_or("(unset)"),
                            diff.desired
                        ));
                    }
                }
            }
            ApplyResult::Failed { error } => {
                println!("  {} {} {}", ui::result_symbol(&resource.result), label, error.red());
            }
            other => println!("  {} {}", ui::result_symbol(other), label),
        }
    }

    let actions = pending_actions(report, registry);
    if !actions.is_empty() {
        ui::section("Deferred actions");
        for (action, device) in &actions {
            println!("  {} {} on {}", "→".cyan(), action, device);
        }
    }

    println!();
    if counts.changes() == 0 && counts.failed == 0 {
        ui::success("No changes needed");
    } else {
        ui::info(&format!(
            "{} to create, {} to update, {} to delete, {} unchanged",
            counts.create, counts.update, counts.delete, counts.unchanged
        ));
    }
    if counts.failed > 0 {
        ui::warn(&format!(
            "{} could not be planned",
            ui::plural(counts.failed, "resource")
        ));
    }

    counts
}

/// Deferred actions an apply would run, as `(action, device)` pairs
pub fn pending_actions(report: &RunReport, registry: &KindRegistry) -> BTreeSet<(String, String)> {
    report
        .resources
        .iter()
        .filter(|r| matches!(r.result, ApplyResult::Planned(_)))
        .filter_map(|r| {
            let kind = registry.get(&r.identity.kind).ok()?;
            let action = kind.action.clone()?;
            Some((action, r.identity.device.clone()))
        })
        .collect()
}
