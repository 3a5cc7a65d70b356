//! Logger setup
//!
//! Console runs get terse `env_logger` output on stderr. Deployment
//! runs write everything down to `debug` into a per-run file instead, and the
//! console shows only `ui` progress lines.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use env_logger::{Builder, Target};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Console level from `-v` count and `--quiet`
pub fn console_level(verbose: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Log to stderr at `level`
pub fn init_console(level: log::LevelFilter) {
    let _ = Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}

/// `<log_dir>/pki-<subsystem>-<phase>.<YYYYmmddHHMMSS>.log`
pub fn log_file_path(log_dir: &Path, subsystem: &str, phase: &str, now: DateTime<Local>) -> PathBuf {
    log_dir.join(format!(
        "pki-{}-{}.{}.log",
        subsystem.to_lowercase(),
        phase,
        now.format("%Y%m%d%H%M%S")
    ))
}

/// Log everything down to `debug` into `path`
pub fn init_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("Logger already initialized")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(0, false), log::LevelFilter::Warn);
        assert_eq!(console_level(1, false), log::LevelFilter::Info);
        assert_eq!(console_level(2, false), log::LevelFilter::Debug);
        assert_eq!(console_level(7, false), log::LevelFilter::Trace);
        assert_eq!(console_level(3, true), log::LevelFilter::Error);
    }

    #[test]
    fn test_log_file_path() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = log_file_path(Path::new("/var/log/pki"), "CA", "spawn", now);
        assert_eq!(
            path,
            PathBuf::from("/var/log/pki/pki-ca-spawn.20240309140507.log")
        );
    }
}
