//! Subcommands
//!
//! `apply`, `plan` and `status` share one pipeline: load the config, check
//! it against the catalog, select resources, connect to the devices they
//! name and hand everything to [`reconcile::Run`].

pub mod apply;
pub mod check;
pub mod kinds;
pub mod plan;
pub mod status;

use anyhow::{Context as AnyhowContext, Result, bail};
use reconcile::{KindRegistry, ResourceSpec, Run, RunOptions, RunReport, Targets};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::Context;
use crate::catalog;
use crate::cli::SelectArgs;
use crate::config::{Config, Filter};
use crate::paths;
use crate::progress::RunProgress;
use crate::ui;

/// Everything a run needs, loaded from the config file
pub struct Workspace {
    pub path: PathBuf,
    pub registry: KindRegistry,
    pub resources: Vec<ResourceSpec>,
    pub targets: Targets,
}

/// Load and validate the config, then select resources and connect
pub fn load(ctx: &Context, select: &SelectArgs) -> Result<Workspace> {
    let path = paths::config_file(ctx.config.as_deref())?;
    log::info!("Loading {}", path.display());
    let config = Config::load(&path)?;
    let registry = catalog::registry()?;

    let problems = config.validate(&registry);
    if !problems.is_empty() {
        for problem in &problems {
            ui::error(problem);
        }
        bail!(
            "{} in {}",
            ui::plural(problems.len(), "problem"),
            path.display()
        );
    }

    if let Some(kind) = &select.kind {
        registry.get(kind)?;
    }
    if let Some(device) = &select.device
        && !config.devices.contains_key(device)
    {
        bail!("Unknown device '{device}'");
    }

    let filter = Filter {
        kind: select.kind.clone(),
        device: select.device.clone(),
    };
    let resources = config.resources(&filter);
    let devices: BTreeSet<&str> = resources
        .iter()
        .map(|r| r.identity.device.as_str())
        .collect();
    let targets = config.targets(devices)?;
    log::debug!(
        "Selected {} on {}",
        ui::plural(resources.len(), "resource"),
        ui::plural(targets.len(), "device")
    );

    Ok(Workspace {
        path,
        registry,
        resources,
        targets,
    })
}

/// Run the selected resources, with terminal progress unless quiet
pub fn execute(ctx: &Context, ws: &Workspace, dry_run: bool, jobs: usize) -> Result<RunReport> {
    let options = RunOptions { dry_run, jobs };
    let mut progress = RunProgress::new(ctx.quiet);
    Run::execute(
        &ws.registry,
        &ws.targets,
        &ws.resources,
        &options,
        &mut progress,
    )
    .with_context(|| format!("Could not run {}", ws.path.display()))
}
