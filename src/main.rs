mod cli;
mod commands;
mod config;
mod deployment;
mod logging;
mod resource;
mod runner;
mod services;
mod subsystem;
mod ui;
mod upgrade;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use scriptlet::Phase;
use std::io;
use std::process::ExitCode;

/// Exit status after an interrupt
const INTERRUPTED: i32 = 130;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:?}");
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Partially applied steps stay as they are; rerunning is idempotent
    ctrlc::set_handler(|| {
        eprintln!();
        ui::warn("Interrupted; completed steps were not rolled back");
        std::process::exit(INTERRUPTED);
    })
    .context("Failed to install interrupt handler")?;

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Spawn(args) => commands::deploy::run(&ctx, Phase::Spawn, &args),
        Command::Respawn(args) => commands::deploy::run(&ctx, Phase::Respawn, &args),
        Command::Destroy(args) => commands::deploy::run(&ctx, Phase::Destroy, &args),
        Command::Upgrade(args) => commands::upgrade::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pkideploy", &mut io::stdout());
            Ok(())
        }
    }
}
