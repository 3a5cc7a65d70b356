//! Numeric owner resolution and application

use anyhow::{Context, Result, bail};
use std::ffi::CString;
use std::os::unix::fs::lchown;
use std::path::Path;

/// Numeric owner and group applied to every managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Owner of the running process
    pub fn current() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        unsafe {
            Self {
                uid: libc::getuid(),
                gid: libc::getgid(),
            }
        }
    }

    /// Resolve account names through the system user and group databases
    pub fn lookup(user: &str, group: &str) -> Result<Self> {
        Ok(Self {
            uid: lookup_uid(user)?,
            gid: lookup_gid(group)?,
        })
    }
}

fn lookup_uid(user: &str) -> Result<u32> {
    let c_user = CString::new(user).context("Invalid user name")?;

    // SAFETY: getpwnam returns NULL or a pointer to static storage that stays
    // valid until the next getpw* call; the uid is copied out immediately.
    unsafe {
        let entry = libc::getpwnam(c_user.as_ptr());
        if entry.is_null() {
            bail!("Unknown user '{}'", user);
        }
        Ok((*entry).pw_uid)
    }
}

fn lookup_gid(group: &str) -> Result<u32> {
    let c_group = CString::new(group).context("Invalid group name")?;

    // SAFETY: as for getpwnam above.
    unsafe {
        let entry = libc::getgrnam(c_group.as_ptr());
        if entry.is_null() {
            bail!("Unknown group '{}'", group);
        }
        Ok((*entry).gr_gid)
    }
}

/// Change owner of `path`; symlinks are changed themselves, not followed
pub fn set_owner(path: &Path, owner: Ownership) -> Result<()> {
    lchown(path, Some(owner.uid), Some(owner.gid))
        .with_context(|| format!("Failed to change owner of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_root() {
        let root = Ownership::lookup("root", "root").unwrap();
        assert_eq!(root, Ownership::new(0, 0));
    }

    #[test]
    fn test_lookup_unknown_user() {
        let err = Ownership::lookup("no-such-user-pkideploy", "root").unwrap_err();
        assert!(err.to_string().contains("no-such-user-pkideploy"));
    }

    #[test]
    fn test_set_owner_to_self() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        std::fs::write(&file, "x").unwrap();

        let me = Ownership::current();
        set_owner(&file, me).unwrap();

        let meta = std::fs::metadata(&file).unwrap();
        assert_eq!((meta.uid(), meta.gid()), (me.uid, me.gid));
    }

    #[test]
    fn test_set_owner_leaves_link_target_alone() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(temp.path().join("absent"), &link).unwrap();

        set_owner(&link, Ownership::current()).unwrap();
        assert!(!temp.path().join("absent").exists());
    }

    #[test]
    fn test_set_owner_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = set_owner(&temp.path().join("nope"), Ownership::current()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
