//! Per-instance trees and the instance registry file

use anyhow::{Context, Result};
use propfile::PropertyFile;
use scriptlet::Scriptlet;

use super::{Deployer, create_dirs, delete_dirs, refresh_dirs};
use crate::resource::DEFAULT_DIR_MODE;
use crate::upgrade::target_version;
use crate::upgrade::tracker::{INSTANCE_VERSION_KEY, TRACKER_DELIMITER};
use crate::upgrade::unit::INSTANCE_CONFIGURATION_KEY;

pub const NAME: &str = "instance_layout";

const DIRS: [&str; 3] = [
    "pki_instance_path",
    "pki_instance_log_path",
    "pki_instance_configuration_path",
];

/// Registry keys rewritten on every spawn and respawn
const REGISTRY_KEYS: [(&str, &str); 6] = [
    ("PKI_INSTANCE_NAME", "pki_instance_name"),
    ("PKI_INSTANCE_PATH", "pki_instance_path"),
    (INSTANCE_CONFIGURATION_KEY, "pki_instance_configuration_path"),
    ("PKI_INSTANCE_LOG_PATH", "pki_instance_log_path"),
    ("PKI_USER", "pki_user"),
    ("PKI_GROUP", "pki_group"),
];

#[derive(Debug)]
pub struct InstanceLayout;

/// Apply the configured ACL, if any, to the instance log tree
fn apply_log_acl(deployer: &Deployer) -> Result<()> {
    let Some(acl) = deployer
        .config
        .get_opt("pki_instance_log_acl")
        .filter(|acl| !acl.is_empty())
    else {
        return Ok(());
    };
    deployer
        .ops
        .directory()
        .mode(DEFAULT_DIR_MODE)
        .overwrite(true)
        .acl(Some(acl))
        .create(&deployer.path("pki_instance_log_path")?)?;
    Ok(())
}

/// Write path keys; record the version only for a new instance
fn write_registry_file(deployer: &Deployer) -> Result<()> {
    let path = deployer.path("pki_instance_registry_file")?;
    if deployer.dry_run() {
        log::info!("[dry-run] would update instance registry {}", path.display());
        return Ok(());
    }

    let mut file = PropertyFile::open(&path, TRACKER_DELIMITER)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    for (name, key) in REGISTRY_KEYS {
        file.set(name, deployer.config.get(key)?);
    }
    if file.get(INSTANCE_VERSION_KEY).is_none() {
        file.set(INSTANCE_VERSION_KEY, &target_version().to_string());
    }
    file.write()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    deployer.ops.file().modify(&path)?;
    Ok(())
}

impl Scriptlet<Deployer> for InstanceLayout {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        create_dirs(deployer, &DIRS, DEFAULT_DIR_MODE)?;
        apply_log_acl(deployer)?;
        write_registry_file(deployer)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        refresh_dirs(deployer, &DIRS, DEFAULT_DIR_MODE)?;
        apply_log_acl(deployer)?;
        write_registry_file(deployer)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        // The registry file belongs to this family's instance
        if deployer.unreferenced(deployer.instance_count()?) {
            deployer
                .ops
                .file()
                .delete(&deployer.path("pki_instance_registry_file")?)?;

            let registry_dir = deployer.path("pki_instance_registry_path")?;
            let dirs = deployer.ops.directory();
            if deployer.dry_run() || dirs.is_empty(&registry_dir)? {
                dirs.delete(&registry_dir)?;
            }
        }

        // The trees are shared by every family using this instance name
        let count = deployer.shared_instance_count()?;
        if !deployer.unreferenced(count) {
            log::info!(
                "{NAME}: {count} subsystems still registered in {}; keeping instance",
                deployer.config.instance_name()?
            );
            return Ok(());
        }
        delete_dirs(deployer, &DIRS)
    }
}
