//! `restsync check` - validate the config without contacting any device

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::catalog;
use crate::config::Config;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let path = paths::config_file(ctx.config.as_deref())?;
    let config = Config::load(&path)?;
    let registry = catalog::registry()?;

    ui::header("restsync check");
    ui::kv("config", &path.display().to_string());
    ui::kv("devices", &config.devices.len().to_string());
    ui::kv("resources", &config.resources.len().to_string());

    let problems = problems(&config, &registry);

    if !ctx.quiet {
        ui::section("Devices");
        for (name, device) in &config.devices {
            let count = config.resources.iter().filter(|r| &r.device == name).count();
            println!(
                "  {:<12} {} {}",
                name.bold(),
                device.url,
                format!("({})", ui::plural(count, "resource")).dimmed()
            );
        }
    }

    println!();
    if problems.is_empty() {
        ui::success("Config is valid");
        return Ok(());
    }
    for problem in &problems {
        ui::error(problem);
    }
    bail!("{} in {}", ui::plural(problems.len(), "problem"), path.display())
}

/// Validation problems plus credentials that cannot be expanded
fn problems(config: &Config, registry: &reconcile::KindRegistry) -> Vec<String> {
    let mut problems = config.validate(registry);
    for (name, device) in &config.devices {
        if let Err(e) = device.client_config(name) {
            problems.push(format!("{e:#}"));
        }
    }
    problems
}
