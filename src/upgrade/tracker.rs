//! Version trackers
//!
//! A tracker is a pair of keys inside an existing property file: one holding
//! the installed version and one holding the index of the last upgrade
//! scriptlet applied on top of it. The file is re-read before every operation
//! because upgrade scriptlets edit the same files between tracker updates.

use anyhow::{Context, Result};
use propfile::PropertyFile;
use std::fs;
use std::path::{Path, PathBuf};

use super::version::Version;
use crate::ui;

pub const INSTANCE_VERSION_KEY: &str = "PKI_VERSION";
pub const INSTANCE_INDEX_KEY: &str = "PKI_UPGRADE_INDEX";
pub const SUBSYSTEM_VERSION_KEY: &str = "cms.product.version";
pub const SUBSYSTEM_INDEX_KEY: &str = "cms.upgrade.index";

/// Delimiter used by both instance registry files and `CS.cfg`
pub const TRACKER_DELIMITER: &str = "=";

#[derive(Debug, Clone)]
pub struct VersionTracker {
    name: String,
    path: PathBuf,
    delimiter: String,
    version_key: String,
    index_key: String,
}

impl VersionTracker {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        delimiter: &str,
        version_key: &str,
        index_key: &str,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            delimiter: delimiter.to_string(),
            version_key: version_key.to_string(),
            index_key: index_key.to_string(),
        }
    }

    /// Tracker stored in an instance registry file
    pub fn instance(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(
            name,
            path,
            TRACKER_DELIMITER,
            INSTANCE_VERSION_KEY,
            INSTANCE_INDEX_KEY,
        )
    }

    /// Tracker stored in a subsystem's `CS.cfg`
    pub fn subsystem(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(
            name,
            path,
            TRACKER_DELIMITER,
            SUBSYSTEM_VERSION_KEY,
            SUBSYSTEM_INDEX_KEY,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PropertyFile> {
        PropertyFile::open(&self.path, &self.delimiter)
            .with_context(|| format!("Failed to load tracker {}", self.name))
    }

    fn save(&self, file: &PropertyFile) -> Result<()> {
        file.write()
            .with_context(|| format!("Failed to update tracker {}", self.name))
    }

    /// Recorded version, or the baseline when none is recorded
    pub fn get_version(&self) -> Result<Version> {
        let file = self.load()?;
        match file.get(&self.version_key) {
            Some(text) if !text.trim().is_empty() => Version::parse(text)
                .with_context(|| format!("Tracker {} holds a bad version", self.name)),
            _ => Ok(Version::baseline()),
        }
    }

    /// Index of the last applied scriptlet, 0 when none
    pub fn get_index(&self) -> Result<u32> {
        let file = self.load()?;
        Ok(file
            .get_parsed::<u32>(&self.index_key)
            .with_context(|| format!("Tracker {} holds a bad upgrade index", self.name))?
            .unwrap_or(0))
    }

    /// Record `index`, directly after the version line when there is one
    pub fn set_index(&self, index: u32) -> Result<()> {
        let mut file = self.load()?;
        let value = index.to_string();

        if file.index_of(&self.index_key).is_some() {
            file.set(&self.index_key, &value);
        } else if let Some(i) = file.index_of(&self.version_key) {
            file.set_at(&self.index_key, &value, i + 1);
        } else {
            file.ensure_blank_separator();
            file.set(&self.index_key, &value);
        }
        self.save(&file)
    }

    pub fn remove_index(&self) -> Result<()> {
        let mut file = self.load()?;
        if file.remove(&self.index_key).is_some() {
            self.save(&file)?;
        }
        Ok(())
    }

    /// Record `version` and drop any index in a single write
    pub fn set_version(&self, version: &Version) -> Result<()> {
        let mut file = self.load()?;
        if file.index_of(&self.version_key).is_none() {
            file.ensure_blank_separator();
        }
        file.set(&self.version_key, &version.to_string());
        file.remove(&self.index_key);
        self.save(&file)
    }

    /// Drop both keys
    pub fn remove(&self) -> Result<()> {
        let mut file = self.load()?;
        let had_version = file.remove(&self.version_key).is_some();
        let had_index = file.remove(&self.index_key).is_some();
        if had_version || had_index {
            self.save(&file)?;
        }
        Ok(())
    }

    /// One-line status such as `ca: 10.1.0 (index 2)`
    pub fn show(&self) -> Result<String> {
        Ok(ui::format_tracker(
            &self.name,
            &self.get_version()?.to_string(),
            self.get_index()?,
        ))
    }

    /// Copy the tracker file to `backup_dir`, mirroring its absolute path
    ///
    /// Returns the backup location, or `None` when the file does not exist.
    pub fn backup(&self, backup_dir: &Path) -> Result<Option<PathBuf>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let relative = self.path.strip_prefix("/").unwrap_or(&self.path);
        let dest = backup_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(&self.path, &dest).with_context(|| {
            format!("Failed to back up {} to {}", self.path.display(), dest.display())
        })?;
        log::debug!("backed up {} to {}", self.path.display(), dest.display());
        Ok(Some(dest))
    }
}
