use anyhow::{Context as _, Result};
use chrono::Local;
use colored::Colorize;
use scriptlet::{Phase, ProgressCallback};
use std::path::PathBuf;

use crate::Context;
use crate::cli::DeployArgs;
use crate::config::{ComposeOptions, ConfigSources, ConfigurationContext};
use crate::deployment::{self, Deployer};
use crate::logging;
use crate::services::Services;
use crate::ui;

/// Console progress for one lifecycle run
struct ConsoleProgress {
    quiet: bool,
    dry_run: bool,
    total: usize,
    current: usize,
}

impl ProgressCallback for ConsoleProgress {
    fn on_sequence_start(&mut self, _phase: Phase, count: usize) {
        self.total = count;
    }

    fn on_scriptlet_start(&mut self, name: &str, _phase: Phase) {
        self.current += 1;
        if !self.quiet {
            ui::step(
                self.current,
                self.total,
                &format!("{}{name}", ui::dry_run_prefix(self.dry_run)),
            );
        }
    }

    fn on_scriptlet_complete(&mut self, name: &str, _phase: Phase, success: bool) {
        if !self.quiet || !success {
            ui::step_result(success, name);
        }
    }

    fn on_sequence_complete(&mut self, _phase: Phase, _success: bool) {}
}

/// Built-in defaults with the operator's file layered on top
fn load_sources(file: Option<&PathBuf>) -> Result<ConfigSources> {
    let defaults = ConfigSources::defaults()?;
    match file {
        Some(path) => Ok(defaults.overlay(ConfigSources::load(path)?)),
        None => Ok(defaults),
    }
}

/// Send the log to a per-run file, falling back to the console
///
/// Dry runs never create the log directory.
fn init_logging(ctx: &Context, config: &ConfigurationContext) -> Option<PathBuf> {
    let console = logging::console_level(ctx.verbose, ctx.quiet);
    if config.dry_run() {
        logging::init_console(console);
        return None;
    }

    let path = match config.path("pki_log_path") {
        Ok(dir) => logging::log_file_path(
            &dir,
            config.subsystem().as_str(),
            config.phase().as_str(),
            Local::now(),
        ),
        Err(_) => {
            logging::init_console(console);
            return None;
        }
    };
    match logging::init_file(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            logging::init_console(console);
            log::warn!("Logging to console only: {e:#}");
            None
        }
    }
}

pub fn run(ctx: &Context, phase: Phase, args: &DeployArgs) -> Result<()> {
    let sources = load_sources(args.file.as_ref())?;

    let mut options = ComposeOptions::new(phase);
    options.dry_run = args.dry_run;
    options.root_prefix = args.root.clone();
    options.instance_name = args.instance.clone();
    let config = sources
        .compose(args.subsystem, &options)
        .with_context(|| format!("Invalid configuration for {}", args.subsystem))?;

    let log_file = init_logging(ctx, &config);
    log::info!(
        "{} {} in instance {}",
        phase.as_str(),
        config.subsystem().as_str(),
        config.instance_name()?
    );

    if !ctx.quiet {
        ui::header(&format!(
            "{}{} {}",
            ui::dry_run_prefix(args.dry_run),
            phase.as_str(),
            config.subsystem().as_str()
        ));
        ui::kv("Instance", config.instance_name()?);
        if let Some(path) = &log_file {
            ui::kv("Log file", &path.display().to_string());
        }
        println!();
    }

    let deployer = Deployer::new(config, Services::system())?;
    let mut progress = ConsoleProgress {
        quiet: ctx.quiet,
        dry_run: args.dry_run,
        total: 0,
        current: 0,
    };

    match deployment::run(&deployer, &mut progress) {
        Ok(report) => {
            log::info!("{} completed: {}", phase.as_str(), report.completed.join(", "));
            if !ctx.quiet {
                println!();
                ui::success(&format!(
                    "{} of {} finished ({} layers)",
                    phase.as_str(),
                    deployer.config.subsystem().as_str(),
                    report.total()
                ));
            }
            Ok(())
        }
        Err(e) => {
            log::error!("{} failed: {e:#}", phase.as_str());
            if let Some(path) = &log_file {
                eprintln!("  {} {}", "Details in".dimmed(), path.display());
            }
            Err(e)
        }
    }
}
