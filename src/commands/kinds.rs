//! `restsync kinds` - list the built-in resource kinds

use anyhow::Result;
use colored::Colorize;
use reconcile::{KindSpec, MatchMode};

use crate::Context;
use crate::catalog;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let registry = catalog::registry()?;

    ui::header("Resource kinds");
    for kind in registry.kinds() {
        println!(
            "  {:<20} {:<10} {:<12} {}",
            kind.name.bold(),
            shape_label(kind),
            kind.key_field,
            catalog::action_label(kind, &registry).dimmed()
        );
        if ctx.verbose > 0 {
            ui::dim(&format!("    list: {}", kind.endpoints.list));
            ui::dim(&format!("    compare: {}", mode_label(kind.policy.mode)));
            for relation in &kind.relations {
                ui::dim(&format!("    {} → {}", relation.field, relation.endpoint));
            }
        }
    }

    println!();
    ui::info(&format!(
        "{}, {}",
        ui::plural(registry.len(), "kind"),
        ui::plural(registry.actions().count(), "deferred action")
    ));
    Ok(())
}

fn shape_label(kind: &KindSpec) -> &'static str {
    if kind.is_singleton() {
        "settings"
    } else {
        "collection"
    }
}

fn mode_label(mode: MatchMode) -> &'static str {
    match mode {
        MatchMode::Exact => "exact",
        MatchMode::CaseInsensitive => "case-insensitive",
        MatchMode::DeepSubset => "deep subset",
    }
}
