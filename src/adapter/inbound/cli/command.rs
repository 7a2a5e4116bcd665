//! Command-line interface definitions.
//!
//! Defines the CLI structure for fleetform using `clap`: `deploy`, `status`
//! and `destroy`, plus global output flags.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Idempotent fleet provisioning and cluster formation
#[derive(Parser, Debug)]
#[command(name = "fleetform")]
#[command(version)]
pub struct Cli {
    /// Path to the fleet configuration file
    #[arg(long, global = true, default_value = "fleet.toml")]
    pub config: PathBuf,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision the fleet, form the cluster and verify health
    Deploy(DeployArgs),

    /// Poll every recorded node once; never changes anything
    Status,

    /// Delete every recorded resource, the token and the state
    Destroy(DestroyArgs),
}

/// Arguments for the `deploy` subcommand.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Adopt existing state; `--idempotent=false` refuses to run over it
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub idempotent: bool,

    /// Maximum concurrent jobs per phase
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Print the planned action per node without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Boot timeout per node, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_defaults_to_idempotent() {
        let cli = Cli::try_parse_from(["fleetform", "deploy"]).unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.idempotent);
        assert!(!args.dry_run);
        assert_eq!(cli.config, PathBuf::from("fleet.toml"));
    }

    #[test]
    fn idempotent_can_be_switched_off() {
        let cli = Cli::try_parse_from(["fleetform", "deploy", "--idempotent=false"]).unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(!args.idempotent);

        let cli = Cli::try_parse_from(["fleetform", "deploy", "--idempotent"]).unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.idempotent);
    }

    #[test]
    fn deploy_flags_parse() {
        let cli = Cli::try_parse_from([
            "fleetform",
            "--json",
            "-vv",
            "deploy",
            "--parallel=8",
            "--timeout=120",
            "--dry-run",
            "--config",
            "lab.toml",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("lab.toml"));
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.parallel, Some(8));
        assert_eq!(args.timeout, Some(120));
        assert!(args.dry_run);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
