//! File primitives
//!
//! Copies default to first-write-wins: once a file exists, administrator edits
//! survive every later respawn unless the caller asks for `overwrite`.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use super::{DEFAULT_FILE_MODE, OpResult, ResourceKind, ResourceOps};

#[derive(Debug, Clone)]
pub struct FileOps<'a> {
    ops: &'a ResourceOps,
    mode: u32,
    overwrite: bool,
}

impl<'a> FileOps<'a> {
    pub(crate) fn new(ops: &'a ResourceOps) -> Self {
        Self {
            ops,
            mode: DEFAULT_FILE_MODE,
            overwrite: false,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Copy `src` to `dst`
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<OpResult> {
        if !src.is_file() {
            bail!("Template file {} does not exist", src.display());
        }
        self.put(dst, &format!("copy {} to", src.display()), |dst| {
            fs::copy(src, dst)
                .map(|_| ())
                .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
        })
    }

    /// Copy `src` to `dst`, replacing each `[NAME]` marker with `slots[NAME]`
    ///
    /// Markers with no slot are left as written.
    pub fn copy_with_slots(
        &self,
        src: &Path,
        dst: &Path,
        slots: &BTreeMap<String, String>,
    ) -> Result<OpResult> {
        let template = fs::read_to_string(src)
            .with_context(|| format!("Failed to read template {}", src.display()))?;
        let content = substitute_slots(&template, slots);
        self.put(dst, &format!("render {} to", src.display()), |dst| {
            write_restricted(dst, &content, self.mode)
        })
    }

    /// Write generated `content` to `dst`
    pub fn write(&self, dst: &Path, content: &str) -> Result<OpResult> {
        self.put(dst, "write", |dst| write_restricted(dst, content, self.mode))
    }

    fn put(
        &self,
        dst: &Path,
        action: &str,
        produce: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<OpResult> {
        let existed = match fs::symlink_metadata(dst) {
            Ok(meta) if meta.is_file() => true,
            Ok(_) => bail!("{} exists and is not a regular file", dst.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", dst.display()));
            }
        };

        if existed && !self.overwrite {
            log::debug!("{} already exists; keeping it", dst.display());
            return Ok(OpResult::NoChange);
        }
        if self.ops.dry_run() {
            return Ok(self.ops.would(action, dst));
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        produce(dst)?;
        self.ops
            .descriptor(dst, ResourceKind::File, self.mode, None)
            .apply()?;

        if existed {
            log::info!("replaced {}", dst.display());
            Ok(OpResult::Modified)
        } else {
            log::info!("created {}", dst.display());
            Ok(OpResult::Created)
        }
    }

    /// Re-apply ownership and mode
    pub fn modify(&self, path: &Path) -> Result<OpResult> {
        if !path.is_file() {
            bail!("Cannot refresh {}: not a file", path.display());
        }
        if self.ops.dry_run() {
            return Ok(self.ops.would("refresh ownership of", path));
        }
        self.ops
            .descriptor(path, ResourceKind::File, self.mode, None)
            .apply()?;
        Ok(OpResult::Modified)
    }

    /// Remove `path`; already absent is success
    pub fn delete(&self, path: &Path) -> Result<OpResult> {
        match fs::symlink_metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("file {} already absent", path.display());
                Ok(OpResult::NoChange)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", path.display())),
            Ok(meta) if meta.is_dir() => {
                bail!("Refusing to remove {}: it is a directory", path.display())
            }
            Ok(_) if self.ops.dry_run() => Ok(self.ops.would("remove file", path)),
            Ok(_) => {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                log::info!("removed {}", path.display());
                Ok(OpResult::Removed)
            }
        }
    }
}

/// Write `content` so it is never readable beyond `mode`
///
/// New files are created with `mode`; an existing file is narrowed before it
/// is truncated.
fn write_restricted(dst: &Path, content: &str, mode: u32) -> Result<()> {
    if dst.exists() {
        fs::set_permissions(dst, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set mode of {}", dst.display()))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(dst)
        .with_context(|| format!("Failed to open {}", dst.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", dst.display()))
}

/// Replace `[NAME]` markers with values from `slots`
pub fn substitute_slots(template: &str, slots: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let replaced = tail[1..]
            .find(']')
            .map(|close| (&tail[1..=close], &tail[close + 2..]))
            .and_then(|(name, after)| slots.get(name).map(|value| (value, after)));
        match replaced {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('[');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
