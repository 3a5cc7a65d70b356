//! Subsystem configuration, NSS database, server start and registration
//!
//! The registry entry is what every other layer counts, so it is written
//! last on spawn and removed first on destroy.

use anyhow::{Context, Result};
use scriptlet::Scriptlet;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

use super::Deployer;
use crate::resource::{DEFAULT_DIR_MODE, OpResult};
use crate::services::ServerHandle;
use crate::upgrade::{VersionTracker, target_version};

pub const NAME: &str = "configuration";

/// NSS database file whose presence means the database exists
const CERT_DB: &str = "cert9.db";

const PASSWORD_FILE_MODE: u32 = 0o600;

#[derive(Debug)]
pub struct Configuration;

/// Every configuration key, upper-cased, as a `[SLOT]` value
fn slots(deployer: &Deployer) -> BTreeMap<String, String> {
    deployer
        .config
        .iter()
        .map(|(k, v)| (k.to_uppercase(), v.to_string()))
        .collect()
}

/// Random hex PIN for the internal token when none is configured
fn generate_pin() -> Result<String> {
    let mut bytes = [0u8; 16];
    File::open("/dev/urandom")
        .and_then(|mut f| f.read_exact(&mut bytes))
        .context("Failed to read random bytes for the database PIN")?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

fn skip_configuration(deployer: &Deployer) -> Result<bool> {
    let skip = deployer.config.flag("pki_skip_configuration")?;
    if skip {
        log::info!("{NAME}: configuration skipped (pki_skip_configuration)");
    }
    Ok(skip)
}

/// Write the deployment configuration replica that marks the subsystem deployed
fn register(deployer: &Deployer) -> Result<()> {
    deployer
        .ops
        .directory()
        .mode(DEFAULT_DIR_MODE)
        .create(&deployer.path("pki_subsystem_registry_path")?)?;
    let replica = deployer
        .config
        .to_replica()
        .context("Failed to render deployment configuration")?;
    deployer
        .ops
        .file()
        .overwrite(true)
        .write(&deployer.path("pki_subsystem_deployment_cfg")?, &replica)?;
    Ok(())
}

/// `CS.cfg` from its template; only a fresh copy gets the version stamp
fn install_cs_cfg(deployer: &Deployer) -> Result<()> {
    let target = deployer.path("pki_target_cs_cfg")?;
    let result = deployer.ops.file().copy_with_slots(
        &deployer.path("pki_source_cs_cfg")?,
        &target,
        &slots(deployer),
    )?;

    if result == OpResult::Created {
        let tracker = VersionTracker::subsystem(deployer.config.subsystem().dir_name(), &target);
        tracker.set_version(&target_version())?;
    }
    Ok(())
}

fn install_database(deployer: &Deployer) -> Result<()> {
    let password_file = deployer.path("pki_password_file")?;
    let pin = match deployer.config.get_opt("pki_pin") {
        Some(pin) => pin.to_string(),
        None => generate_pin()?,
    };
    deployer
        .ops
        .file()
        .mode(PASSWORD_FILE_MODE)
        .write(&password_file, &format!("internal={pin}\n"))?;

    let db = deployer.path("pki_database_path")?;
    deployer.ops.directory().create(&db)?;
    if db.join(CERT_DB).exists() {
        log::debug!("NSS database in {} already exists", db.display());
    } else if deployer.dry_run() {
        log::info!("[dry-run] would create NSS database in {}", db.display());
    } else {
        deployer
            .services
            .certdb
            .create_database(&db, &password_file)?;
    }
    Ok(())
}

fn restart_server(deployer: &Deployer) -> Result<()> {
    let server = ServerHandle::from_context(&deployer.config)?;
    if deployer.dry_run() {
        log::info!("[dry-run] would restart {}", server.service);
        return Ok(());
    }
    let timeout = Duration::from_secs(deployer.config.number("pki_startup_timeout")?);
    deployer.services.server.restart(&server)?;
    deployer.services.server.wait_for_startup(&server, timeout)
}

impl Scriptlet<Deployer> for Configuration {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if !skip_configuration(deployer)? && deployer.tomcat_only(NAME) {
            install_cs_cfg(deployer)?;
            install_database(deployer)?;
            restart_server(deployer)?;
        }
        register(deployer)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if !skip_configuration(deployer)? && deployer.tomcat_only(NAME) {
            let cs_cfg = deployer.path("pki_target_cs_cfg")?;
            if cs_cfg.is_file() {
                deployer.ops.file().modify(&cs_cfg)?;
            } else {
                install_cs_cfg(deployer)?;
            }
            restart_server(deployer)?;
        }
        register(deployer)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if !skip_configuration(deployer)? && deployer.tomcat_only(NAME) {
            let server = ServerHandle::from_context(&deployer.config)?;
            if deployer.dry_run() {
                log::info!("[dry-run] would stop {}", server.service);
            } else {
                deployer.services.server.stop(&server)?;
            }
        }
        deployer
            .ops
            .directory()
            .delete(&deployer.path("pki_subsystem_registry_path")?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_pin() {
        let pin = generate_pin().unwrap();
        assert_eq!(pin.len(), 32);
        assert!(pin.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(pin, generate_pin().unwrap());
    }
}
