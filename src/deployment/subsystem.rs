//! Per-subsystem trees, templates and convenience links

use anyhow::Result;
use scriptlet::Scriptlet;
use std::path::PathBuf;

use super::{Deployer, create_dirs, delete_dirs, link_into, refresh_dirs};
use crate::resource::DEFAULT_DIR_MODE;
use crate::subsystem::SubsystemType;

pub const NAME: &str = "subsystem_layout";

const DIRS: [&str; 4] = [
    "pki_subsystem_path",
    "pki_subsystem_log_path",
    "pki_subsystem_archive_log_path",
    "pki_subsystem_configuration_path",
];

const SIGNED_AUDIT_DIR: &str = "pki_subsystem_signed_audit_log_path";

/// `<subsystem>/<name>` -> configured path
const LINKS: [(&str, &str); 4] = [
    ("conf", "pki_subsystem_configuration_path"),
    ("logs", "pki_subsystem_log_path"),
    ("registry", "pki_subsystem_registry_path"),
    ("alias", "pki_database_path"),
];

const CA_PROFILES: [&str; 6] = [
    "admincert",
    "caauditsigningcert",
    "cacert",
    "caocspcert",
    "servercert",
    "subsystemcert",
];

const KRA_PROFILES: [&str; 4] = ["servercert", "storagecert", "subsystemcert", "transportcert"];

fn profiles(subsystem: SubsystemType) -> &'static [&'static str] {
    match subsystem {
        SubsystemType::Ca => &CA_PROFILES,
        SubsystemType::Kra => &KRA_PROFILES,
        _ => &[],
    }
}

/// Directory keys for this subsystem type
fn dirs(deployer: &Deployer) -> Vec<&'static str> {
    let mut dirs = DIRS.to_vec();
    if deployer.config.subsystem().has_signed_audit() {
        dirs.push(SIGNED_AUDIT_DIR);
    }
    dirs
}

/// Source and destination of a file under the template and subsystem conf dirs
fn conf_file(deployer: &Deployer, name: &str) -> Result<(PathBuf, PathBuf)> {
    Ok((
        deployer.path("pki_source_conf_path")?.join(name),
        deployer.path("pki_subsystem_configuration_path")?.join(name),
    ))
}

/// Copy the type-specific templates
///
/// `refresh` re-copies those that are safe to overwrite; the flat-file
/// database changes at runtime and is only ever copied once.
fn copy_templates(deployer: &Deployer, refresh: bool) -> Result<()> {
    let subsystem = deployer.config.subsystem();
    let files = deployer.ops.file().overwrite(refresh);

    if subsystem == SubsystemType::Ca {
        let dirs = deployer.ops.directory().overwrite(refresh);
        dirs.copy(
            &deployer.path("pki_source_emails_path")?,
            &deployer.path("pki_subsystem_emails_path")?,
        )?;
        dirs.copy(
            &deployer.path("pki_source_profiles_path")?,
            &deployer.path("pki_subsystem_profiles_path")?,
        )?;

        let (src, dst) = conf_file(deployer, "flatfile.txt")?;
        deployer.ops.file().copy(&src, &dst)?;

        let (src, dst) = conf_file(deployer, "registry.cfg")?;
        files.copy(&src, &dst)?;
    }

    for profile in profiles(subsystem) {
        let (src, dst) = conf_file(deployer, &format!("{profile}.profile"))?;
        files.copy(&src, &dst)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct SubsystemLayout;

impl Scriptlet<Deployer> for SubsystemLayout {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        create_dirs(deployer, &dirs(deployer), DEFAULT_DIR_MODE)?;
        copy_templates(deployer, false)?;
        link_into(deployer, &deployer.path("pki_subsystem_path")?, &LINKS)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        refresh_dirs(deployer, &dirs(deployer), DEFAULT_DIR_MODE)?;
        copy_templates(deployer, true)?;
        link_into(deployer, &deployer.path("pki_subsystem_path")?, &LINKS)?;

        // Files copied once and edited since still get their ownership back
        let conf = deployer.path("pki_subsystem_configuration_path")?;
        if !deployer.dry_run() && conf.is_dir() {
            deployer.ops.directory().modify(&conf)?;
        }
        Ok(())
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? {
            return Ok(());
        }
        delete_dirs(deployer, &dirs(deployer))
    }
}
