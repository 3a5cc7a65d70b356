//! Idempotent filesystem primitives
//!
//! Every deployment layer is built from three kinds of resources:
//! - Directories (create, refresh ownership/mode, copy a template tree, delete)
//! - Symlinks (never replace or delete a real file)
//! - Files (copy with first-write-wins, slot substitution, generated content)
//!
//! Running any primitive twice leaves the filesystem as running it once. In
//! dry-run mode each primitive logs what it would do and returns
//! [`OpResult::Skipped`] without touching anything.

pub mod directory;
pub mod file;
pub mod ownership;
pub mod symlink;

use crate::config::ConfigurationContext;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub use directory::DirectoryOps;
pub use file::FileOps;
pub use ownership::Ownership;
pub use symlink::SymlinkOps;

/// Mode for directories below the top-level trees
pub const DEFAULT_DIR_MODE: u32 = 0o770;
/// Mode for top-level shared trees
pub const PUBLIC_DIR_MODE: u32 = 0o755;
/// Mode for copied and generated files
pub const DEFAULT_FILE_MODE: u32 = 0o660;

/// Kind of filesystem object a descriptor manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Directory,
    Symlink,
    File,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Directory => write!(f, "directory"),
            ResourceKind::Symlink => write!(f, "symlink"),
            ResourceKind::File => write!(f, "file"),
        }
    }
}

/// Desired attributes of one managed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: PathBuf,
    pub kind: ResourceKind,
    pub owner: Ownership,
    pub mode: u32,
    pub acl: Option<String>,
}

impl ResourceDescriptor {
    /// Apply owner, mode and ACL to the existing path
    ///
    /// Symlinks only get their owner changed; their mode is meaningless.
    pub fn apply(&self) -> Result<()> {
        ownership::set_owner(&self.path, self.owner)?;

        if self.kind != ResourceKind::Symlink {
            fs::set_permissions(&self.path, fs::Permissions::from_mode(self.mode))
                .with_context(|| format!("Failed to set mode of {}", self.path.display()))?;
        }

        if let Some(acl) = &self.acl {
            let path = self.path.to_string_lossy();
            crate::runner::run_capture("setfacl", &["-m", acl, &path])
                .with_context(|| format!("Failed to apply ACL to {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Result of one primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Already in the desired state
    NoChange,
    Created,
    Modified,
    Removed,
    /// Nothing was done (dry run, or refusing to touch a foreign object)
    Skipped { reason: String },
}

impl OpResult {
    pub fn changed(&self) -> bool {
        matches!(self, OpResult::Created | OpResult::Modified | OpResult::Removed)
    }
}

/// Entry point to the primitives, carrying the run-wide settings
#[derive(Debug, Clone)]
pub struct ResourceOps {
    dry_run: bool,
    owner: Ownership,
}

impl ResourceOps {
    pub fn new(dry_run: bool, owner: Ownership) -> Self {
        Self { dry_run, owner }
    }

    /// Owner from `pki_uid`/`pki_gid` when set, else `pki_user`/`pki_group`
    pub fn from_context(ctx: &ConfigurationContext) -> Result<Self> {
        let owner = match (ctx.get_opt("pki_uid"), ctx.get_opt("pki_gid")) {
            (Some(_), Some(_)) => Ownership::new(ctx.number("pki_uid")?, ctx.number("pki_gid")?),
            _ => Ownership::lookup(ctx.get("pki_user")?, ctx.get("pki_group")?)?,
        };
        log::debug!("resources owned by uid {} gid {}", owner.uid, owner.gid);
        Ok(Self::new(ctx.dry_run(), owner))
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn directory(&self) -> DirectoryOps<'_> {
        DirectoryOps::new(self)
    }

    pub fn symlink(&self) -> SymlinkOps<'_> {
        SymlinkOps::new(self)
    }

    pub fn file(&self) -> FileOps<'_> {
        FileOps::new(self)
    }

    pub(crate) fn descriptor(
        &self,
        path: &Path,
        kind: ResourceKind,
        mode: u32,
        acl: Option<&str>,
    ) -> ResourceDescriptor {
        ResourceDescriptor {
            path: path.to_path_buf(),
            kind,
            owner: self.owner,
            mode,
            acl: acl.map(str::to_string),
        }
    }

    /// Log a dry-run action and return the skip marker
    pub(crate) fn would(&self, action: &str, path: &Path) -> OpResult {
        log::info!("[dry-run] would {} {}", action, path.display());
        OpResult::Skipped {
            reason: "dry run".to_string(),
        }
    }
}
