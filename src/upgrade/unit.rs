//! Upgrade units: deployed instances and their subsystems

use anyhow::{Context, Result};
use propfile::PropertyFile;
use std::fmt;
use std::path::{Path, PathBuf};

use super::tracker::{TRACKER_DELIMITER, VersionTracker};
use crate::config::{ComposeOptions, ConfigSources};
use crate::deployment::registry::DeploymentRegistry;
use crate::subsystem::{SubsystemType, WebServerFamily};
use scriptlet::Phase;

/// Registry key holding an instance's configuration directory
pub const INSTANCE_CONFIGURATION_KEY: &str = "PKI_INSTANCE_CONFIGURATION_PATH";

/// Host-level locations an upgrade works from
#[derive(Debug, Clone)]
pub struct UpgradePaths {
    pub registry: PathBuf,
    pub configuration: PathBuf,
    pub backup: PathBuf,
}

impl UpgradePaths {
    /// Locations under `root` (or `/`), taken from the built-in defaults
    pub fn from_root(root: Option<&Path>) -> Result<Self> {
        let mut options = ComposeOptions::new(Phase::Respawn);
        options.root_prefix = root.map(Path::to_path_buf);
        let ctx = ConfigSources::defaults()?.compose(SubsystemType::Ca, &options)?;

        Ok(Self {
            registry: ctx.path("pki_registry_path")?,
            configuration: ctx.path("pki_configuration_path")?,
            backup: ctx.path("pki_log_path")?.join("upgrade").join("backup"),
        })
    }
}

/// A deployed Tomcat instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub registry_file: PathBuf,
    pub configuration_path: PathBuf,
}

impl Instance {
    pub fn tracker(&self) -> VersionTracker {
        VersionTracker::instance(&self.name, &self.registry_file)
    }
}

/// One subsystem inside an [`Instance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsystem {
    pub instance: String,
    pub kind: SubsystemType,
    pub cs_cfg: PathBuf,
}

impl Subsystem {
    pub fn tracker(&self) -> VersionTracker {
        VersionTracker::subsystem(self.to_string(), &self.cs_cfg)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance, self.kind.dir_name())
    }
}

/// Which instances and subsystems an upgrade covers
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub instance: Option<String>,
    pub subsystem: Option<SubsystemType>,
}

impl Scope {
    pub fn subsystem_only(&self) -> bool {
        self.subsystem.is_some()
    }
}

/// An instance together with the subsystems selected for upgrade
#[derive(Debug, Clone)]
pub struct Unit {
    pub instance: Instance,
    pub subsystems: Vec<Subsystem>,
}

/// Find instances under `<registry>/tomcat/` that match `scope`
///
/// A directory counts as an instance only if it holds a registry file with
/// the instance's own name.
pub fn discover(paths: &UpgradePaths, scope: &Scope) -> Result<Vec<Unit>> {
    let registry = DeploymentRegistry::new(&paths.registry);
    let family = WebServerFamily::Tomcat;
    let mut units = Vec::new();

    for name in registry.instances(family)? {
        if scope.instance.as_ref().is_some_and(|wanted| *wanted != name) {
            continue;
        }
        let registry_file = registry.instance_dir(family, &name).join(&name);
        if !registry_file.is_file() {
            log::debug!("skipping {}: no instance registry file", name);
            continue;
        }

        let file = PropertyFile::open(&registry_file, TRACKER_DELIMITER)
            .with_context(|| format!("Failed to read registry of instance {}", name))?;
        let configuration_path = file
            .get(INSTANCE_CONFIGURATION_KEY)
            .filter(|v| !v.is_empty())
            .map_or_else(|| paths.configuration.join(&name), PathBuf::from);

        let subsystems = registry
            .subsystems(family, &name)?
            .into_iter()
            .filter(|kind| scope.subsystem.is_none_or(|wanted| wanted == *kind))
            .map(|kind| Subsystem {
                instance: name.clone(),
                kind,
                cs_cfg: configuration_path.join(kind.dir_name()).join("CS.cfg"),
            })
            .collect::<Vec<_>>();

        if scope.subsystem_only() && subsystems.is_empty() {
            continue;
        }

        units.push(Unit {
            instance: Instance {
                name,
                registry_file,
                configuration_path,
            },
            subsystems,
        });
    }

    Ok(units)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(root: &Path) -> UpgradePaths {
        UpgradePaths::from_root(Some(root)).unwrap()
    }

    #[test]
    fn test_paths_under_root() {
        let temp = TempDir::new().unwrap();
        let paths = paths(temp.path());
        assert_eq!(paths.registry, temp.path().join("etc/sysconfig/pki"));
        assert_eq!(paths.backup, temp.path().join("var/log/pki/upgrade/backup"));
    }

    #[test]
    fn test_discover_instances_and_subsystems() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "10.0.0", &[("ca", "10.0.0"), ("kra", "10.0.0")]);
        fixtures::instance(temp.path(), "pki-two", "10.0.0", &[("ocsp", "10.0.0")]);
        // Directory without a registry file of the same name
        fs::create_dir_all(temp.path().join("etc/sysconfig/pki/tomcat/stray")).unwrap();

        let units = discover(&paths(temp.path()), &Scope::default()).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].instance.name, "pki-tomcat");
        assert_eq!(
            units[0].subsystems.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            ["pki-tomcat/ca", "pki-tomcat/kra"]
        );
        assert_eq!(
            units[0].subsystems[0].cs_cfg,
            temp.path().join("etc/pki/pki-tomcat/ca/CS.cfg")
        );
    }

    #[test]
    fn test_discover_scoped() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "10.0.0", &[("ca", "10.0.0"), ("kra", "10.0.0")]);
        fixtures::instance(temp.path(), "pki-two", "10.0.0", &[("ca", "10.0.0")]);

        let scope = Scope {
            instance: Some("pki-tomcat".into()),
            subsystem: Some(SubsystemType::Kra),
        };
        let units = discover(&paths(temp.path()), &scope).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].subsystems.len(), 1);
        assert_eq!(units[0].subsystems[0].kind, SubsystemType::Kra);
    }

    #[test]
    fn test_discover_empty_host() {
        let temp = TempDir::new().unwrap();
        assert!(discover(&paths(temp.path()), &Scope::default()).unwrap().is_empty());
    }
}
