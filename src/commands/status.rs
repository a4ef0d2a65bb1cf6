//! `restsync status` - which declared resources are in sync

use anyhow::Result;
use colored::Colorize;
use reconcile::{ApplyResult, PlannedAction, RunReport};
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::SelectArgs;
use crate::ui;

/// Per-device tallies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub in_sync: usize,
    pub drifted: usize,
    pub failed: usize,
}

pub fn run(ctx: &Context, args: &SelectArgs) -> Result<()> {
    let ws = super::load(ctx, args)?;
    ui::header("restsync status");
    ui::kv("config", &ws.path.display().to_string());

    if ws.resources.is_empty() {
        println!();
        ui::info("No resources selected");
        return Ok(());
    }

    let report = super::execute(ctx, &ws, true, args.jobs)?;
    let devices = by_device(&report);

    for (device, status) in &devices {
        ui::section(device);
        for resource in report.resources.iter().filter(|r| &r.identity.device == device) {
            let identity = &resource.identity;
            let state = match &resource.result {
                ApplyResult::NoChange => "in sync".green().to_string(),
                ApplyResult::Planned(PlannedAction::Create) => "missing".yellow().to_string(),
                ApplyResult::Planned(PlannedAction::Delete) => "present".yellow().to_string(),
                ApplyResult::Planned(PlannedAction::Update(diffs)) => {
                    format!("drifted ({})", ui::plural(diffs.len(), "field"))
                        .yellow()
                        .to_string()
                }
                ApplyResult::Failed { error } => ui::truncate(error, 60).red().to_string(),
                other => other.symbol().to_string(),
            };
            println!(
                "  {} {:<20} {:<28} {}",
                ui::result_symbol(&resource.result),
                identity.kind,
                identity.key,
                state
            );

            if ctx.verbose > 0
                && let ApplyResult::Planned(PlannedAction::Update(diffs)) = &resource.result
            {
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
        ui::dim(&format!(
            "{} in sync, {} drifted, {} failed",
            status.in_sync, status.drifted, status.failed
        ));
    }

    println!();
    let drifted: usize = devices.values().map(|s| s.drifted).sum();
    if report.summary.failed > 0 {
        ui::warn(&format!(
            "{} could not be read",
            ui::plural(report.summary.failed, "resource")
        ));
    }
    if drifted == 0 {
        ui::success("Everything in sync");
    } else {
        ui::info(&format!(
            "{} out of sync, run 'restsync plan' for details",
            ui::plural(drifted, "resource")
        ));
    }
    Ok(())
}

/// Tally results per device, devices in name order
pub fn by_device(report: &RunReport) -> BTreeMap<String, DeviceStatus> {
    let mut devices: BTreeMap<String, DeviceStatus> = BTreeMap::new();
    for resource in &report.resources {
        let status = devices.entry(resource.identity.device.clone()).or_default();
        match resource.result {
            ApplyResult::NoChange => status.in_sync += 1,
            ApplyResult::Failed { .. } => status.failed += 1,
            _ => status.drifted += 1,
        }
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{ResourceIdentity, ResourceReport};

    #[test]
    fn test_by_device() {
        let entry = |device: &str, key: &str, result| ResourceReport {
            identity: ResourceIdentity::new("firewall_alias", device, key),
            result,
        };
        let report = RunReport {
            resources: vec![
                entry("fw2", "a", ApplyResult::NoChange),
                entry("fw1", "b", ApplyResult::Planned(PlannedAction::Create)),
                entry("fw1", "c", ApplyResult::NoChange),
                entry(
                    "fw1",
                    "d",
                    ApplyResult::Failed {
                        error: "boom".to_string(),
                    },
                ),
            ],
            ..RunReport::default()
        };

        let devices = by_device(&report);
        assert_eq!(devices.keys().collect::<Vec<_>>(), vec!["fw1", "fw2"]);
        assert_eq!(
            devices["fw1"],
            DeviceStatus {
                in_sync: 1,
                drifted: 1,
                failed: 1,
            }
        );
        assert_eq!(devices["fw2"].in_sync, 1);
    }
}
