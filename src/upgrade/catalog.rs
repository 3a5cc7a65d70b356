//! Upgrade scriptlets and the catalog that orders them

use anyhow::Result;
use std::fmt;

use super::unit::{Instance, Subsystem};
use super::version::Version;

/// One upgrade step, applied to instances and/or subsystems
///
/// Both hooks default to doing nothing, so a scriptlet only implements the
/// level it touches. Scriptlets must tolerate running against a unit that
/// already has their change.
pub trait UpgradeScriptlet: fmt::Debug {
    fn message(&self) -> &str;

    fn upgrade_instance(&self, _instance: &Instance) -> Result<()> {
        Ok(())
    }

    fn upgrade_subsystem(&self, _instance: &Instance, _subsystem: &Subsystem) -> Result<()> {
        Ok(())
    }
}

/// Scriptlets of one version, in index order (index 1 first)
#[derive(Debug)]
struct VersionEntry {
    version: Version,
    scriptlets: Vec<Box<dyn UpgradeScriptlet>>,
}

/// A version to process and the version units move to after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeStep {
    pub version: Version,
    pub next: Version,
}

/// Every known upgrade, ordered by version
#[derive(Debug, Default)]
pub struct UpgradeCatalog {
    versions: Vec<VersionEntry>,
}

impl UpgradeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog compiled into this release
    pub fn builtin() -> Self {
        super::scriptlets::register(Self::new())
    }

    /// Append `scriptlet` as the next index of `version`
    pub fn with(mut self, version: Version, scriptlet: Box<dyn UpgradeScriptlet>) -> Self {
        match self.versions.iter_mut().find(|e| e.version == version) {
            Some(entry) => entry.scriptlets.push(scriptlet),
            None => {
                self.versions.push(VersionEntry {
                    version,
                    scriptlets: vec![scriptlet],
                });
                self.versions.sort_by(|a, b| a.version.cmp(&b.version));
            }
        }
        self
    }

    /// Scriptlets of `version`; index `i` is at position `i - 1`
    pub fn scriptlets(&self, version: &Version) -> &[Box<dyn UpgradeScriptlet>] {
        self.versions
            .iter()
            .find(|e| e.version == *version)
            .map_or(&[], |e| e.scriptlets.as_slice())
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter().map(|e| &e.version)
    }

    /// Steps from `current` up to and including `target`
    pub fn versions_between(&self, current: &Version, target: &Version) -> Vec<UpgradeStep> {
        self.plan(std::slice::from_ref(current), target)
    }

    /// Steps covering every starting version and every catalog version up to `target`
    ///
    /// Each version links to its successor and the last one links to
    /// `target`. Starting versions above `target` are ignored.
    pub fn plan(&self, starts: &[Version], target: &Version) -> Vec<UpgradeStep> {
        let Some(lowest) = starts.iter().filter(|v| *v <= target).min() else {
            return Vec::new();
        };

        let mut versions: Vec<Version> = starts
            .iter()
            .chain(self.versions())
            .filter(|v| *v >= lowest && *v <= target)
            .cloned()
            .collect();
        versions.sort();
        versions.dedup();

        let nexts: Vec<Version> = versions
            .iter()
            .skip(1)
            .cloned()
            .chain(std::iter::once(target.clone()))
            .collect();

        versions
            .into_iter()
            .zip(nexts)
            .map(|(version, next)| UpgradeStep { version, next })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl UpgradeScriptlet for Named {
        fn message(&self) -> &str {
            self.0
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn catalog() -> UpgradeCatalog {
        UpgradeCatalog::new()
            .with(v("1.1"), Box::new(Named("c")))
            .with(v("1.0"), Box::new(Named("a")))
            .with(v("1.0"), Box::new(Named("b")))
    }

    fn steps(steps: &[UpgradeStep]) -> Vec<(String, String)> {
        steps
            .iter()
            .map(|s| (s.version.to_string(), s.next.to_string()))
            .collect()
    }

    #[test]
    fn test_indexes_follow_insertion_order() {
        let catalog = catalog();
        let messages: Vec<_> = catalog.scriptlets(&v("1.0")).iter().map(|s| s.message()).collect();
        assert_eq!(messages, ["a", "b"]);
        assert!(catalog.scriptlets(&v("2.0")).is_empty());
        assert_eq!(
            catalog.versions().map(ToString::to_string).collect::<Vec<_>>(),
            ["1.0", "1.1"]
        );
    }

    #[test]
    fn test_versions_between_links_successors() {
        let catalog = catalog();
        assert_eq!(
            steps(&catalog.versions_between(&v("1.0"), &v("1.1"))),
            [("1.0".into(), "1.1".into()), ("1.1".into(), "1.1".into())]
        );
        assert_eq!(
            steps(&catalog.versions_between(&v("0.9"), &v("1.2"))),
            [
                ("0.9".into(), "1.0".into()),
                ("1.0".into(), "1.1".into()),
                ("1.1".into(), "1.2".into()),
            ]
        );
    }

    #[test]
    fn test_versions_between_excludes_outside_range() {
        let catalog = catalog();
        assert_eq!(
            steps(&catalog.versions_between(&v("1.0.5"), &v("1.1"))),
            [("1.0.5".into(), "1.1".into()), ("1.1".into(), "1.1".into())]
        );
        assert!(catalog.versions_between(&v("2.0"), &v("1.1")).is_empty());
    }

    #[test]
    fn test_plan_includes_every_start() {
        let catalog = catalog();
        let plan = catalog.plan(&[v("1.0"), v("1.0.3")], &v("1.1"));
        assert_eq!(
            steps(&plan),
            [
                ("1.0".into(), "1.0.3".into()),
                ("1.0.3".into(), "1.1".into()),
                ("1.1".into(), "1.1".into()),
            ]
        );
    }
}
