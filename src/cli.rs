use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "restsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative configuration for REST-managed network appliances", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/restsync.toml)
    #[arg(short, long, global = true, env = "RESTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make the devices match the declared resources
    Apply(ApplyArgs),

    /// Show what apply would change, field by field
    Plan(SelectArgs),

    /// Show which declared resources are in sync
    Status(SelectArgs),

    /// List built-in resource kinds
    Kinds,

    /// Validate the config file without contacting any device
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Which declared resources a command works on
#[derive(Args, Clone, Default)]
pub struct SelectArgs {
    /// Only resources of this kind
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Only resources on this device
    #[arg(short, long)]
    pub device: Option<String>,

    /// Parallel list requests
    #[arg(short = 'j', long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "restsync", "-vv", "apply", "--dry-run", "-y", "--kind", "gateway", "-j", "8",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert!(args.yes);
        assert_eq!(args.select.kind.as_deref(), Some("gateway"));
        assert_eq!(args.select.jobs, 8);
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["restsync", "plan", "--config", "/tmp/fw.toml", "-d", "fw1"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fw.toml")));
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.device.as_deref(), Some("fw1"));
        assert_eq!(args.jobs, 4);
    }
}
