use anyhow::{Result, bail};

use crate::Context;
use crate::cli::UpgradeArgs;
use crate::logging;
use crate::ui;
use crate::upgrade::{
    AlwaysAbort, ContinuePolicy, PromptOperator, Scope, UpgradeCatalog, UpgradePaths,
    UpgradeSequencer, target_version,
};

pub fn run(ctx: &Context, args: &UpgradeArgs) -> Result<()> {
    logging::init_console(logging::console_level(ctx.verbose, ctx.quiet));

    let paths = UpgradePaths::from_root(args.root.as_deref())?;
    let scope = Scope {
        instance: args.instance.clone(),
        subsystem: args.subsystem,
    };
    let catalog = UpgradeCatalog::builtin();
    let policy: Box<dyn ContinuePolicy> = if args.silent {
        Box::new(AlwaysAbort)
    } else {
        Box::new(PromptOperator)
    };
    let mut sequencer =
        UpgradeSequencer::new(&catalog, policy.as_ref(), paths, scope, target_version());

    if args.status {
        ui::header("Upgrade Trackers");
        let lines = sequencer.status()?;
        if lines.is_empty() {
            ui::dim("No deployed instances found");
        }
        for line in lines {
            println!("  {line}");
        }
        return Ok(());
    }

    if args.reset_tracker {
        let count = sequencer.reset_trackers()?;
        ui::success(&format!("Reset {count} trackers to {}", sequencer.target()));
        return Ok(());
    }

    if args.remove_tracker {
        let count = sequencer.remove_trackers()?;
        ui::success(&format!("Removed {count} trackers"));
        return Ok(());
    }

    let current = sequencer.current_version()?;
    if !ctx.quiet {
        ui::header("Upgrade");
        ui::kv("Current version", &current.to_string());
        ui::kv("Target version", &sequencer.target().to_string());
        println!();
    }

    let report = sequencer.upgrade()?;
    if report.is_success() {
        ui::success(&format!(
            "Upgrade complete ({} scriptlets applied, {} units advanced)",
            report.applied, report.advanced
        ));
        return Ok(());
    }

    for unit in &report.skipped {
        ui::warn(&format!("{unit} was not upgraded"));
    }
    bail!("{} units skipped after failures", report.skipped.len())
}
