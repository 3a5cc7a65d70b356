use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::subsystem::SubsystemType;

#[derive(Parser)]
#[command(name = "pkideploy")]
#[command(version)]
#[command(about = "Deploy, remove and upgrade PKI subsystems", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install a subsystem (creating its instance if needed)
    Spawn(DeployArgs),

    /// Refresh an installed subsystem in place
    Respawn(DeployArgs),

    /// Remove a subsystem (and its instance once it is the last one)
    Destroy(DeployArgs),

    /// Upgrade deployed instances and subsystems to this release
    Upgrade(UpgradeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    /// Subsystem type (CA, KRA, OCSP, TKS, TPS, RA)
    #[arg(short, long)]
    pub subsystem: SubsystemType,

    /// Deployment configuration layered over the built-in defaults
    #[arg(short = 'f', long = "file", env = "PKI_DEPLOYMENT_CFG")]
    pub file: Option<PathBuf>,

    /// Install under this directory instead of /
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Instance name (overrides the configuration)
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Report what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct UpgradeArgs {
    /// Only this instance
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Only this subsystem (instance-level upgrades are skipped)
    #[arg(short, long)]
    pub subsystem: Option<SubsystemType>,

    /// Abort on the first failure instead of asking
    #[arg(long)]
    pub silent: bool,

    /// Show trackers and exit
    #[arg(long, conflicts_with_all = ["reset_tracker", "remove_tracker"])]
    pub status: bool,

    /// Mark every tracker in scope as up to date
    #[arg(long, conflicts_with = "remove_tracker")]
    pub reset_tracker: bool,

    /// Delete tracker keys
    #[arg(long)]
    pub remove_tracker: bool,

    /// Host root (defaults to /)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_spawn() {
        let cli = Cli::try_parse_from([
            "pkideploy", "spawn", "-s", "ca", "-f", "/tmp/ca.toml", "--dry-run",
        ])
        .unwrap();
        let Command::Spawn(args) = cli.command else {
            panic!("expected spawn");
        };
        assert_eq!(args.subsystem, SubsystemType::Ca);
        assert_eq!(args.file, Some(PathBuf::from("/tmp/ca.toml")));
        assert!(args.dry_run);
    }

    #[test]
    fn test_upgrade_flags_conflict() {
        assert!(Cli::try_parse_from(["pkideploy", "upgrade", "--status", "--reset-tracker"]).is_err());
    }

    #[test]
    fn test_unknown_subsystem_rejected() {
        assert!(Cli::try_parse_from(["pkideploy", "destroy", "-s", "xyz"]).is_err());
    }
}
