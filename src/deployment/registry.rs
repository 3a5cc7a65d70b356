//! On-disk registry of deployed subsystems
//!
//! Layout: `<pki_registry_path>/<family>/<instance>/<subsystem>/`. A subsystem
//! counts as deployed while its directory exists. No counter is stored; every
//! question about shared ownership re-scans this tree, so two concurrent runs
//! on one host can race each other.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ConfigurationContext;
use crate::subsystem::{SubsystemType, WebServerFamily};

const FAMILIES: [WebServerFamily; 2] = [WebServerFamily::Tomcat, WebServerFamily::Apache];

#[derive(Debug, Clone)]
pub struct DeploymentRegistry {
    root: PathBuf,
}

impl DeploymentRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_context(ctx: &ConfigurationContext) -> Result<Self> {
        Ok(Self::new(ctx.path("pki_registry_path")?))
    }

    pub fn family_dir(&self, family: WebServerFamily) -> PathBuf {
        self.root.join(family.dir_name())
    }

    pub fn instance_dir(&self, family: WebServerFamily, instance: &str) -> PathBuf {
        self.family_dir(family).join(instance)
    }

    /// Instance directories of `family`, sorted
    pub fn instances(&self, family: WebServerFamily) -> Result<Vec<String>> {
        let mut names = subdirectories(&self.family_dir(family))?;
        names.sort();
        Ok(names)
    }

    /// Subsystems registered in one instance
    pub fn subsystems(&self, family: WebServerFamily, instance: &str) -> Result<Vec<SubsystemType>> {
        let mut found: Vec<SubsystemType> = subdirectories(&self.instance_dir(family, instance))?
            .iter()
            .filter_map(|name| {
                SubsystemType::ALL
                    .into_iter()
                    .find(|t| t.dir_name() == name.as_str())
            })
            .collect();
        found.sort();
        Ok(found)
    }

    pub fn count_instance(&self, family: WebServerFamily, instance: &str) -> Result<usize> {
        Ok(self.subsystems(family, instance)?.len())
    }

    /// Subsystems registered under `instance` in either family
    ///
    /// Instance trees are keyed by name only, so a Tomcat and an Apache
    /// instance with the same name share them.
    pub fn count_named(&self, instance: &str) -> Result<usize> {
        let mut total = 0;
        for family in FAMILIES {
            total += self.count_instance(family, instance)?;
        }
        Ok(total)
    }

    /// Subsystems registered in any instance of `family`
    pub fn count_family(&self, family: WebServerFamily) -> Result<usize> {
        let mut total = 0;
        for instance in self.instances(family)? {
            total += self.count_instance(family, &instance)?;
        }
        Ok(total)
    }

    /// Every registered subsystem on the host, across families and instances
    pub fn count_all(&self) -> Result<usize> {
        let mut total = 0;
        for family in FAMILIES {
            total += self.count_family(family)?;
        }
        Ok(total)
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to inspect {}", entry.path().display()))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}
