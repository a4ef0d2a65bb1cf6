//! `restsync apply` - make the devices match the config
//!
//! A dry run always goes first so the operator sees the plan; the real run
//! starts from scratch afterwards with fresh observed state.

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{ApplyResult, BarrierOutcome, RunReport};

use super::plan;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let ws = super::load(ctx, &args.select)?;
    if ws.resources.is_empty() {
        ui::info("No resources selected");
        return Ok(());
    }

    let preview = super::execute(ctx, &ws, true, args.select.jobs)?;
    ui::header("Plan");
    let counts = plan::print_plan(&preview, &ws.registry, ctx.verbose > 0);

    if counts.changes() == 0 {
        if counts.failed > 0 {
            bail!("{} could not be planned", ui::plural(counts.failed, "resource"));
        }
        return Ok(());
    }

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let report = super::execute(ctx, &ws, false, args.select.jobs)?;
    print_barrier(&report.barrier);
    print_summary(&report);

    if !report.is_success() {
        bail!("Apply finished with errors");
    }
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_barrier(outcomes: &[BarrierOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    ui::section("Deferred actions");
    for outcome in outcomes {
        println!(
            "  {} {} on {}: {}",
            ui::barrier_symbol(&outcome.status),
            outcome.action,
            outcome.device,
            outcome.status
        );
        if let Some(detail) = &outcome.detail {
            ui::dim(&format!("    {}", ui::truncate(detail, 100)));
        }
    }
}

/// Print final summary
fn print_summary(report: &RunReport) {
    println!();
    if report.is_success() {
        println!(
            "  {} Configuration applied successfully!",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        );
    }

    for line in summary_lines(report) {
        println!("    • {line}");
    }

    for failure in report.failures() {
        if let ApplyResult::Failed { error } = &failure.result {
            println!("    {} {}: {}", "✗".red(), failure.identity, error);
        }
    }
}

fn summary_lines(report: &RunReport) -> Vec<String> {
    let summary = &report.summary;
    let skipped = report
        .barrier
        .iter()
        .filter(|o| !o.status.is_applied())
        .count();

    let mut lines = Vec::new();
    if summary.created > 0 {
        lines.push(format!("{} created", ui::plural(summary.created, "resource")));
    }
    if summary.modified > 0 {
        lines.push(format!("{} modified", ui::plural(summary.modified, "resource")));
    }
    if summary.removed > 0 {
        lines.push(format!("{} removed", ui::plural(summary.removed, "resource")));
    }
    if summary.unchanged > 0 {
        lines.push(format!("{} unchanged", ui::plural(summary.unchanged, "resource")));
    }
    if summary.failed > 0 {
        lines.push(format!("{} failed", ui::plural(summary.failed, "resource")));
    }
    if skipped > 0 {
        lines.push(format!(
            "{} not applied",
            ui::plural(skipped, "deferred action")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{ApplySummary, BarrierStatus, ResourceIdentity, ResourceReport};

    #[test]
    fn test_summary_lines() {
        let mut report = RunReport {
            resources: vec![ResourceReport {
                identity: ResourceIdentity::new("haproxy_server", "fw1", "app1"),
                result: ApplyResult::Created,
            }],
            barrier: vec![BarrierOutcome {
                action: "haproxy".to_string(),
                device: "fw1".to_string(),
                status: BarrierStatus::SkippedAlert,
                detail: Some("[ALERT] backend has no server".to_string()),
            }],
            summary: ApplySummary::default(),
        };
        report.summary.add_result(&ApplyResult::Created);
        report.summary.add_result(&ApplyResult::NoChange);
        report.summary.add_result(&ApplyResult::NoChange);

        assert_eq!(
            summary_lines(&report),
            vec![
                "1 resource created",
                "2 resources unchanged",
                "1 deferred action not applied"
            ]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_summary_lines_empty_for_noop() {
        assert!(summary_lines(&RunReport::default()).is_empty());
    }
}
