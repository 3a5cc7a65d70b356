use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// An external tool exited unsuccessfully
///
/// Carries both output streams so the operator sees what the tool said.
#[derive(Debug, thiserror::Error)]
#[error("command failed: {command} ({status}){}", render_streams(.stdout, .stderr))]
pub struct ProcessError {
    pub command: String,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

fn render_streams(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stderr.trim().is_empty() {
        out.push_str(&format!("\nstderr: {}", stderr.trim()));
    }
    if !stdout.trim().is_empty() {
        out.push_str(&format!("\nstdout: {}", stdout.trim()));
    }
    out
}

fn describe(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

fn check(cmd: &str, args: &[&str], output: Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        log::debug!("{} succeeded", describe(cmd, args));
        return Ok(stdout);
    }

    let status = output
        .status
        .code()
        .map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}"));
    Err(ProcessError {
        command: describe(cmd, args),
        status,
        stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
    .into())
}

/// Run a command and capture output
///
/// A nonzero exit becomes a [`ProcessError`].
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    log::debug!("running: {}", describe(cmd, args));
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    check(cmd, args, output)
}

/// Run a command feeding `input` on stdin, capturing output
pub fn run_with_input(cmd: &str, args: &[&str], input: &str) -> Result<String> {
    log::debug!("running: {} (with stdin)", describe(cmd, args));
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("Failed to write stdin of {cmd}"))?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for: {}", describe(cmd, args)))?;

    check(cmd, args, output)
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
