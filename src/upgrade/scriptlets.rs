//! Built-in upgrade scriptlets
//!
//! Each one edits a property file in place and leaves it alone when the
//! change is already there.

use anyhow::{Context, Result};
use propfile::PropertyFile;
use std::path::Path;

use super::catalog::{UpgradeCatalog, UpgradeScriptlet};
use super::tracker::TRACKER_DELIMITER;
use super::unit::{INSTANCE_CONFIGURATION_KEY, Instance, Subsystem};
use super::version::Version;

pub(super) fn register(catalog: UpgradeCatalog) -> UpgradeCatalog {
    catalog
        .with(Version::baseline(), Box::new(RecordInstanceConfiguration))
        .with(Version::baseline(), Box::new(DropLegacyDebugSettings))
        .with(Version::from_parts(&[10, 0, 5]), Box::new(EnableSignedAuditLogging))
}

/// Apply `edit` to the property file at `path`, writing only if it changed
fn edit_properties(path: &Path, edit: impl FnOnce(&mut PropertyFile) -> bool) -> Result<()> {
    let mut file = PropertyFile::open(path, TRACKER_DELIMITER)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if edit(&mut file) {
        file.write()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("updated {}", path.display());
    } else {
        log::debug!("{} already up to date", path.display());
    }
    Ok(())
}

/// Older instance registry files did not record the configuration directory
#[derive(Debug)]
struct RecordInstanceConfiguration;

impl UpgradeScriptlet for RecordInstanceConfiguration {
    fn message(&self) -> &str {
        "Record instance configuration path in registry"
    }

    fn upgrade_instance(&self, instance: &Instance) -> Result<()> {
        let value = instance.configuration_path.display().to_string();
        edit_properties(&instance.registry_file, |file| {
            if file.get(INSTANCE_CONFIGURATION_KEY).is_some() {
                return false;
            }
            file.set(INSTANCE_CONFIGURATION_KEY, &value);
            true
        })
    }
}

#[derive(Debug)]
struct DropLegacyDebugSettings;

const LEGACY_DEBUG_KEYS: [&str; 3] = ["debug.enabled", "debug.filename", "debug.hashkeytypes"];

impl UpgradeScriptlet for DropLegacyDebugSettings {
    fn message(&self) -> &str {
        "Remove legacy debug settings from CS.cfg"
    }

    fn upgrade_subsystem(&self, _instance: &Instance, subsystem: &Subsystem) -> Result<()> {
        edit_properties(&subsystem.cs_cfg, |file| {
            let mut changed = false;
            for key in LEGACY_DEBUG_KEYS {
                changed |= file.remove(key).is_some();
            }
            changed
        })
    }
}

#[derive(Debug)]
struct EnableSignedAuditLogging;

impl UpgradeScriptlet for EnableSignedAuditLogging {
    fn message(&self) -> &str {
        "Enable signed audit logging"
    }

    fn upgrade_subsystem(&self, _instance: &Instance, subsystem: &Subsystem) -> Result<()> {
        if !subsystem.kind.has_signed_audit() {
            return Ok(());
        }
        edit_properties(&subsystem.cs_cfg, |file| {
            let key = "log.instance.SignedAudit.logSigning";
            if file.get(key) == Some("true") {
                return false;
            }
            file.set(key, "true");
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::SubsystemType;
    use std::fs;
    use tempfile::TempDir;

    fn instance(temp: &TempDir, registry: &str) -> Instance {
        let registry_file = temp.path().join("pki-tomcat");
        fs::write(&registry_file, registry).unwrap();
        Instance {
            name: "pki-tomcat".into(),
            registry_file,
            configuration_path: temp.path().join("etc/pki/pki-tomcat"),
        }
    }

    fn subsystem(temp: &TempDir, cs_cfg: &str) -> Subsystem {
        let path = temp.path().join("CS.cfg");
        fs::write(&path, cs_cfg).unwrap();
        Subsystem {
            instance: "pki-tomcat".into(),
            kind: SubsystemType::Ca,
            cs_cfg: path,
        }
    }

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = UpgradeCatalog::builtin();
        let baseline: Vec<_> = catalog
            .scriptlets(&Version::baseline())
            .iter()
            .map(|s| s.message().to_string())
            .collect();
        assert_eq!(baseline.len(), 2);
        assert!(baseline[0].contains("registry"));
        assert_eq!(catalog.scriptlets(&Version::from_parts(&[10, 0, 5])).len(), 1);
    }

    #[test]
    fn test_record_instance_configuration_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let inst = instance(&temp, "PKI_INSTANCE_NAME=pki-tomcat\n");

        RecordInstanceConfiguration.upgrade_instance(&inst).unwrap();
        let once = fs::read_to_string(&inst.registry_file).unwrap();
        RecordInstanceConfiguration.upgrade_instance(&inst).unwrap();

        assert!(once.contains(INSTANCE_CONFIGURATION_KEY));
        assert_eq!(fs::read_to_string(&inst.registry_file).unwrap(), once);
    }

    #[test]
    fn test_drop_legacy_debug_settings() {
        let temp = TempDir::new().unwrap();
        let inst = instance(&temp, "");
        let sub = subsystem(&temp, "cs.type=CA\ndebug.enabled=true\ndebug.filename=/tmp/d\n");

        DropLegacyDebugSettings.upgrade_subsystem(&inst, &sub).unwrap();
        DropLegacyDebugSettings.upgrade_subsystem(&inst, &sub).unwrap();

        assert_eq!(fs::read_to_string(&sub.cs_cfg).unwrap(), "cs.type=CA\n");
    }

    #[test]
    fn test_enable_signed_audit_logging() {
        let temp = TempDir::new().unwrap();
        let inst = instance(&temp, "");
        let sub = subsystem(&temp, "log.instance.SignedAudit.logSigning=false\n");

        EnableSignedAuditLogging.upgrade_subsystem(&inst, &sub).unwrap();

        assert_eq!(
            fs::read_to_string(&sub.cs_cfg).unwrap(),
            "log.instance.SignedAudit.logSigning=true\n"
        );
    }
}
