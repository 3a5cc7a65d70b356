//! Host-wide trees shared by every instance

use anyhow::Result;
use scriptlet::Scriptlet;

use super::{Deployer, create_dirs, refresh_dirs};
use crate::resource::{DEFAULT_DIR_MODE, PUBLIC_DIR_MODE};

pub const NAME: &str = "infrastructure_layout";

const TOP_LEVEL: [&str; 4] = [
    "pki_path",
    "pki_log_path",
    "pki_configuration_path",
    "pki_registry_path",
];

const REGISTRY: [&str; 2] = ["pki_family_registry_path", "pki_instance_registry_path"];

#[derive(Debug)]
pub struct InfrastructureLayout;

impl Scriptlet<Deployer> for InfrastructureLayout {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        create_dirs(deployer, &TOP_LEVEL, PUBLIC_DIR_MODE)?;
        create_dirs(deployer, &REGISTRY, DEFAULT_DIR_MODE)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        refresh_dirs(deployer, &TOP_LEVEL, PUBLIC_DIR_MODE)?;
        refresh_dirs(deployer, &REGISTRY, DEFAULT_DIR_MODE)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        let registry = deployer.registry()?;

        // This family's registry goes with its last subsystem
        if deployer.unreferenced(registry.count_family(deployer.config.family())?) {
            delete_empty_dirs(deployer, REGISTRY.iter().rev())?;
        }

        let count = registry.count_all()?;
        if !deployer.unreferenced(count) {
            log::info!("{NAME}: {count} subsystems still registered on this host; keeping shared trees");
            return Ok(());
        }
        delete_empty_dirs(deployer, TOP_LEVEL.iter())
    }
}

/// Remove each directory in turn; anything not created by a deployment stays
fn delete_empty_dirs<'a>(deployer: &Deployer, keys: impl Iterator<Item = &'a &'a str>) -> Result<()> {
    for key in keys {
        let path = deployer.path(key)?;
        let dirs = deployer.ops.directory();
        if deployer.dry_run() || dirs.is_empty(&path)? {
            dirs.delete(&path)?;
        } else {
            log::warn!("{NAME}: {} is not empty; leaving it in place", path.display());
        }
    }
    Ok(())
}
