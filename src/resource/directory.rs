//! Directory primitives

use anyhow::{Context, Result, bail};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use super::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, OpResult, ResourceKind, ResourceOps};

/// Directory operations with per-call mode, overwrite and ACL settings
#[derive(Debug, Clone)]
pub struct DirectoryOps<'a> {
    ops: &'a ResourceOps,
    mode: u32,
    overwrite: bool,
    acl: Option<String>,
}

impl<'a> DirectoryOps<'a> {
    pub(crate) fn new(ops: &'a ResourceOps) -> Self {
        Self {
            ops,
            mode: DEFAULT_DIR_MODE,
            overwrite: false,
            acl: None,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Re-apply attributes to an existing directory on create; replace
    /// existing files on copy
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn acl(mut self, acl: Option<&str>) -> Self {
        self.acl = acl.map(str::to_string);
        self
    }

    /// Create `path` and any missing parents
    pub fn create(&self, path: &Path) -> Result<OpResult> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => {
                if !self.overwrite {
                    log::debug!("directory {} already exists", path.display());
                    return Ok(OpResult::NoChange);
                }
                if self.ops.dry_run() {
                    return Ok(self.ops.would("refresh directory", path));
                }
                self.apply(path, ResourceKind::Directory, self.mode)?;
                Ok(OpResult::Modified)
            }
            Ok(_) => bail!("{} exists and is not a directory", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.ops.dry_run() {
                    return Ok(self.ops.would("create directory", path));
                }
                fs::create_dir_all(path)
                    .with_context(|| format!("Failed to create directory {}", path.display()))?;
                self.apply(path, ResourceKind::Directory, self.mode)?;
                log::info!("created directory {}", path.display());
                Ok(OpResult::Created)
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to inspect {}", path.display()))
            }
        }
    }

    /// Re-apply ownership and mode to an existing tree
    ///
    /// Subdirectories get this builder's mode, files the default file mode.
    /// Symlinks inside the tree are re-owned but not followed.
    pub fn modify(&self, path: &Path) -> Result<OpResult> {
        if self.ops.dry_run() {
            return Ok(self.ops.would("refresh ownership of", path));
        }
        if !path.is_dir() {
            bail!("Cannot refresh {}: not a directory", path.display());
        }

        for entry in WalkDir::new(path) {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            let kind = if entry.path_is_symlink() {
                ResourceKind::Symlink
            } else if entry.file_type().is_dir() {
                ResourceKind::Directory
            } else {
                ResourceKind::File
            };
            let mode = match kind {
                ResourceKind::File => DEFAULT_FILE_MODE,
                _ => self.mode,
            };
            self.ops
                .descriptor(entry.path(), kind, mode, None)
                .apply()?;
        }

        if let Some(acl) = &self.acl {
            self.ops
                .descriptor(path, ResourceKind::Directory, self.mode, Some(acl))
                .apply()?;
        }
        log::debug!("refreshed {}", path.display());
        Ok(OpResult::Modified)
    }

    /// Copy the template tree `src` into `dst`
    ///
    /// Existing files under `dst` are kept unless `overwrite` is set.
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<OpResult> {
        if !src.is_dir() {
            bail!("Template directory {} does not exist", src.display());
        }
        let existed = dst.exists();
        if self.ops.dry_run() {
            return Ok(self.ops.would(
                &format!("copy {} to", src.display()),
                dst,
            ));
        }

        let mut copied = 0usize;
        for entry in WalkDir::new(src) {
            let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .with_context(|| format!("Unexpected path {}", entry.path().display()))?;
            let target = dst.join(relative);

            if entry.path_is_symlink() {
                let link = fs::read_link(entry.path())
                    .with_context(|| format!("Failed to read link {}", entry.path().display()))?;
                if self.ops.symlink().create(&link, &target)?.changed() {
                    copied += 1;
                }
            } else if entry.file_type().is_dir() {
                if self.create(&target)? == OpResult::Created {
                    copied += 1;
                }
            } else if self.overwrite || !target.exists() {
                fs::copy(entry.path(), &target).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    )
                })?;
                self.apply(&target, ResourceKind::File, DEFAULT_FILE_MODE)?;
                copied += 1;
            }
        }

        log::info!("copied {} entries from {} to {}", copied, src.display(), dst.display());
        Ok(match (existed, copied) {
            (false, _) => OpResult::Created,
            (true, 0) => OpResult::NoChange,
            (true, _) => OpResult::Modified,
        })
    }

    /// Remove `path` recursively
    ///
    /// Already absent is success. A symlink is removed as a link; its target
    /// is never followed.
    pub fn delete(&self, path: &Path) -> Result<OpResult> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("directory {} already absent", path.display());
                return Ok(OpResult::NoChange);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", path.display()));
            }
        };

        if self.ops.dry_run() {
            return Ok(self.ops.would("remove directory", path));
        }

        if meta.file_type().is_symlink() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove link {}", path.display()))?;
        } else if meta.is_dir() {
            fs::remove_dir_all(path)
                .with_context(|| format!("Failed to remove directory {}", path.display()))?;
        } else {
            bail!("Refusing to remove {}: not a directory", path.display());
        }

        log::info!("removed directory {}", path.display());
        Ok(OpResult::Removed)
    }

    /// Whether `path` has no entries; an absent path counts as empty
    pub fn is_empty(&self, path: &Path) -> Result<bool> {
        match fs::read_dir(path) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e).with_context(|| format!("Failed to list {}", path.display())),
        }
    }

    fn apply(&self, path: &Path, kind: ResourceKind, mode: u32) -> Result<()> {
        self.ops
            .descriptor(path, kind, mode, self.acl.as_deref())
            .apply()
    }
}
