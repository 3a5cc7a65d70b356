//! Symlink primitives
//!
//! A real file or directory is never replaced or removed through these
//! operations, only actual links.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{OpResult, ResourceKind, ResourceOps};

#[derive(Debug, Clone)]
pub struct SymlinkOps<'a> {
    ops: &'a ResourceOps,
}

#[derive(Debug, PartialEq, Eq)]
enum SymlinkState {
    Missing,
    Correct,
    WrongTarget(PathBuf),
    NotALink,
}

impl<'a> SymlinkOps<'a> {
    pub(crate) fn new(ops: &'a ResourceOps) -> Self {
        Self { ops }
    }

    /// Compare the link's literal target; dangling links are legitimate
    fn check_current(target: &Path, link: &Path) -> Result<SymlinkState> {
        match fs::symlink_metadata(link) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SymlinkState::Missing),
            Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", link.display())),
            Ok(meta) if meta.file_type().is_symlink() => {
                let actual = fs::read_link(link)
                    .with_context(|| format!("Failed to read symlink {}", link.display()))?;
                if actual == target {
                    Ok(SymlinkState::Correct)
                } else {
                    Ok(SymlinkState::WrongTarget(actual))
                }
            }
            Ok(_) => Ok(SymlinkState::NotALink),
        }
    }

    /// Point `link` at `target`
    pub fn create(&self, target: &Path, link: &Path) -> Result<OpResult> {
        let state = Self::check_current(target, link)?;
        match state {
            SymlinkState::Correct => {
                log::debug!("symlink {} already points at {}", link.display(), target.display());
                Ok(OpResult::NoChange)
            }
            SymlinkState::NotALink => bail!(
                "Refusing to replace {} with a symlink: a real file or directory is there",
                link.display()
            ),
            _ if self.ops.dry_run() => Ok(self.ops.would(
                &format!("link {} ->", target.display()),
                link,
            )),
            SymlinkState::WrongTarget(previous) => {
                fs::remove_file(link).with_context(|| {
                    format!("Failed to remove existing symlink: {}", link.display())
                })?;
                self.make(target, link)?;
                log::info!(
                    "repointed {} from {} to {}",
                    link.display(),
                    previous.display(),
                    target.display()
                );
                Ok(OpResult::Modified)
            }
            SymlinkState::Missing => {
                if let Some(parent) = link.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create parent directory: {}", parent.display())
                    })?;
                }
                self.make(target, link)?;
                log::info!("linked {} -> {}", link.display(), target.display());
                Ok(OpResult::Created)
            }
        }
    }

    fn make(&self, target: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "Failed to create symlink: {} -> {}",
                link.display(),
                target.display()
            )
        })?;
        self.ops
            .descriptor(link, ResourceKind::Symlink, 0, None)
            .apply()
    }

    /// Re-apply ownership to the link itself
    pub fn modify(&self, link: &Path) -> Result<OpResult> {
        if !link.is_symlink() {
            bail!("Cannot refresh {}: not a symlink", link.display());
        }
        if self.ops.dry_run() {
            return Ok(self.ops.would("refresh ownership of", link));
        }
        self.ops
            .descriptor(link, ResourceKind::Symlink, 0, None)
            .apply()?;
        Ok(OpResult::Modified)
    }

    /// Remove `link` if it is a symlink
    ///
    /// A real file or directory at that path is left in place and reported.
    pub fn delete(&self, link: &Path) -> Result<OpResult> {
        match fs::symlink_metadata(link) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("symlink {} already absent", link.display());
                Ok(OpResult::NoChange)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", link.display())),
            Ok(meta) if !meta.file_type().is_symlink() => {
                log::warn!("{} is not a symlink; leaving it in place", link.display());
                Ok(OpResult::Skipped {
                    reason: "not a symlink".to_string(),
                })
            }
            Ok(_) if self.ops.dry_run() => Ok(self.ops.would("remove symlink", link)),
            Ok(_) => {
                fs::remove_file(link)
                    .with_context(|| format!("Failed to remove symlink {}", link.display()))?;
                log::info!("removed symlink {}", link.display());
                Ok(OpResult::Removed)
            }
        }
    }
}
