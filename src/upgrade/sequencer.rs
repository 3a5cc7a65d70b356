//! Upgrade sequencer
//!
//! Walks the catalog version by version and index by index. A scriptlet
//! `(V, I)` runs on a unit only while the unit's tracker reads version `V`
//! and index `I - 1`, so an interrupted run resumes where it stopped and a
//! finished step is never applied twice.

use anyhow::Result;
use std::collections::BTreeSet;

use super::catalog::{UpgradeCatalog, UpgradeStep};
use super::policy::ContinuePolicy;
use super::tracker::VersionTracker;
use super::unit::{Scope, Unit, UpgradePaths, discover};
use super::version::Version;
use crate::ui;

/// Outcome of an upgrade run
#[derive(Debug, Default)]
pub struct UpgradeReport {
    /// Scriptlet applications that succeeded
    pub applied: usize,
    /// Units moved across a version with no scriptlets
    pub advanced: usize,
    /// Units the operator chose to leave behind
    pub skipped: Vec<String>,
}

impl UpgradeReport {
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct UpgradeSequencer<'a> {
    catalog: &'a UpgradeCatalog,
    policy: &'a dyn ContinuePolicy,
    paths: UpgradePaths,
    scope: Scope,
    target: Version,
    skipped: BTreeSet<String>,
}

impl<'a> UpgradeSequencer<'a> {
    pub fn new(
        catalog: &'a UpgradeCatalog,
        policy: &'a dyn ContinuePolicy,
        paths: UpgradePaths,
        scope: Scope,
        target: Version,
    ) -> Self {
        Self {
            catalog,
            policy,
            paths,
            scope,
            target,
            skipped: BTreeSet::new(),
        }
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    pub fn units(&self) -> Result<Vec<Unit>> {
        discover(&self.paths, &self.scope)
    }

    /// Trackers in scope; instance trackers are left out when scoped to a subsystem
    fn trackers(&self, units: &[Unit]) -> Vec<VersionTracker> {
        let mut trackers = Vec::new();
        for unit in units {
            if !self.scope.subsystem_only() {
                trackers.push(unit.instance.tracker());
            }
            trackers.extend(unit.subsystems.iter().map(|s| s.tracker()));
        }
        trackers
    }

    /// Lowest version across the fleet, or the target when nothing is deployed
    pub fn current_version(&self) -> Result<Version> {
        let units = self.units()?;
        let mut lowest: Option<Version> = None;
        for tracker in self.trackers(&units) {
            let version = tracker.get_version()?;
            if lowest.as_ref().is_none_or(|l| version < *l) {
                lowest = Some(version);
            }
        }
        Ok(lowest.unwrap_or_else(|| self.target.clone()))
    }

    /// One status line per tracker
    pub fn status(&self) -> Result<Vec<String>> {
        let units = self.units()?;
        self.trackers(&units).iter().map(VersionTracker::show).collect()
    }

    /// Mark every tracker in scope as already at the target version
    pub fn reset_trackers(&self) -> Result<usize> {
        let units = self.units()?;
        let trackers = self.trackers(&units);
        for tracker in &trackers {
            tracker.set_version(&self.target)?;
            log::info!("reset {} to {}", tracker.name(), self.target);
        }
        Ok(trackers.len())
    }

    /// Delete the tracker keys of every unit in scope
    pub fn remove_trackers(&self) -> Result<usize> {
        let units = self.units()?;
        let trackers = self.trackers(&units);
        for tracker in &trackers {
            tracker.remove()?;
            log::info!("removed tracker of {}", tracker.name());
        }
        Ok(trackers.len())
    }

    /// Bring every unit in scope up to the target version
    pub fn upgrade(&mut self) -> Result<UpgradeReport> {
        let units = self.units()?;
        let mut report = UpgradeReport::default();

        // Units already sitting at the target with no pending index are done
        let mut pending = BTreeSet::new();
        let mut starts = Vec::new();
        for tracker in self.trackers(&units) {
            let version = tracker.get_version()?;
            let index = tracker.get_index()?;
            if version > self.target || (version == self.target && index == 0) {
                log::debug!("{} is up to date ({})", tracker.name(), version);
                continue;
            }
            pending.insert(tracker.name().to_string());
            starts.push(version);
        }

        if pending.is_empty() {
            ui::success(&format!("Everything is up to date ({})", self.target));
            return Ok(report);
        }

        let catalog = self.catalog;
        for step in catalog.plan(&starts, &self.target) {
            let scriptlets = catalog.scriptlets(&step.version);
            if scriptlets.is_empty() {
                self.advance(&mut report, &pending, &units, &step)?;
                continue;
            }

            ui::section(&format!("Upgrading from {}", step.version));
            let last = scriptlets.len();
            for (position, scriptlet) in scriptlets.iter().enumerate() {
                let index = position + 1;
                ui::step(index, last, scriptlet.message());
                let at = StepIndex {
                    step: &step,
                    index,
                    last,
                };

                for unit in &units {
                    if !self.scope.subsystem_only() {
                        self.apply(&mut report, &pending, &unit.instance.tracker(), &at, || {
                            scriptlet.upgrade_instance(&unit.instance)
                        })?;
                    }
                    for subsystem in &unit.subsystems {
                        self.apply(&mut report, &pending, &subsystem.tracker(), &at, || {
                            scriptlet.upgrade_subsystem(&unit.instance, subsystem)
                        })?;
                    }
                }
            }
        }

        Ok(report)
    }

    fn backup_dir(&self, version: &Version, index: usize) -> std::path::PathBuf {
        self.paths
            .backup
            .join(version.to_string())
            .join(index.to_string())
    }

    /// Move units across a version that has no scriptlets
    fn advance(
        &self,
        report: &mut UpgradeReport,
        pending: &BTreeSet<String>,
        units: &[Unit],
        step: &UpgradeStep,
    ) -> Result<()> {
        for tracker in self.trackers(units) {
            if !pending.contains(tracker.name()) || self.skipped.contains(tracker.name()) {
                continue;
            }
            if tracker.get_version()? != step.version {
                continue;
            }
            tracker.backup(&self.backup_dir(&step.version, 0))?;
            tracker.set_version(&step.next)?;
            log::info!("{}: {} -> {}", tracker.name(), step.version, step.next);
            report.advanced += 1;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        report: &mut UpgradeReport,
        pending: &BTreeSet<String>,
        tracker: &VersionTracker,
        at: &StepIndex<'_>,
        run: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let name = tracker.name();
        if !pending.contains(name) || self.skipped.contains(name) {
            return Ok(());
        }
        let version = tracker.get_version()?;
        let done = tracker.get_index()?;
        if version != at.step.version || done as usize + 1 != at.index {
            log::debug!(
                "{}: not eligible for {} #{} (at {} index {})",
                name,
                at.step.version,
                at.index,
                version,
                done
            );
            return Ok(());
        }

        tracker.backup(&self.backup_dir(&at.step.version, at.index))?;

        match run() {
            Ok(()) => {
                if at.index == at.last {
                    tracker.set_version(&at.step.next)?;
                } else {
                    tracker.set_index(u32::try_from(at.index)?)?;
                }
                report.applied += 1;
                ui::step_result(true, name);
                Ok(())
            }
            Err(e) => {
                ui::step_result(false, &format!("{name}: {e:#}"));
                log::error!(
                    "{} #{} failed on {}: {:#}",
                    at.step.version,
                    at.index,
                    name,
                    e
                );
                if self.policy.should_continue(name, &e)? {
                    ui::warn(&format!("Skipping {name} for the rest of this upgrade"));
                    self.skipped.insert(name.to_string());
                    report.skipped.push(name.to_string());
                    Ok(())
                } else {
                    Err(e.context(format!(
                        "Upgrade of {} failed at {} #{}",
                        name, at.step.version, at.index
                    )))
                }
            }
        }
    }
}

/// Position of one scriptlet within a step
struct StepIndex<'s> {
    step: &'s UpgradeStep,
    index: usize,
    last: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::SubsystemType;
    use crate::upgrade::catalog::UpgradeScriptlet;
    use crate::upgrade::policy::AlwaysAbort;
    use crate::upgrade::unit::{Instance, Subsystem, fixtures};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    type Calls = Rc<RefCell<Vec<String>>>;

    #[derive(Debug)]
    struct Recording {
        name: &'static str,
        calls: Calls,
        fail_on: Option<&'static str>,
    }

    impl Recording {
        fn boxed(name: &'static str, calls: &Calls) -> Box<dyn UpgradeScriptlet> {
            Box::new(Self {
                name,
                calls: Rc::clone(calls),
                fail_on: None,
            })
        }

        fn record(&self, unit: String) -> Result<()> {
            let failed = self.fail_on == Some(unit.as_str());
            self.calls.borrow_mut().push(format!("{}:{}", self.name, unit));
            if failed {
                anyhow::bail!("{} broke {}", self.name, unit);
            }
            Ok(())
        }
    }

    impl UpgradeScriptlet for Recording {
        fn message(&self) -> &str {
            self.name
        }

        fn upgrade_instance(&self, instance: &Instance) -> Result<()> {
            self.record(instance.name.clone())
        }

        fn upgrade_subsystem(&self, _instance: &Instance, subsystem: &Subsystem) -> Result<()> {
            self.record(subsystem.to_string())
        }
    }

    struct SkipAll;

    impl ContinuePolicy for SkipAll {
        fn should_continue(&self, _unit: &str, _error: &anyhow::Error) -> Result<bool> {
            Ok(true)
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn catalog(calls: &Calls) -> UpgradeCatalog {
        UpgradeCatalog::new()
            .with(v("1.0"), Recording::boxed("a", calls))
            .with(v("1.0"), Recording::boxed("b", calls))
            .with(v("1.1"), Recording::boxed("c", calls))
    }

    fn sequencer<'a>(
        root: &Path,
        catalog: &'a UpgradeCatalog,
        policy: &'a dyn ContinuePolicy,
        scope: Scope,
        target: &str,
    ) -> UpgradeSequencer<'a> {
        let paths = UpgradePaths::from_root(Some(root)).unwrap();
        UpgradeSequencer::new(catalog, policy, paths, scope, v(target))
    }

    fn cs_cfg(root: &Path, instance: &str, sub: &str) -> String {
        fs::read_to_string(root.join("etc/pki").join(instance).join(sub).join("CS.cfg")).unwrap()
    }

    #[test]
    fn test_version_monotonicity() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "1.0", &[("ca", "1.0")]);
        let calls = Calls::default();
        let catalog = catalog(&calls);

        let report = sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
            .upgrade()
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.applied, 6);
        assert_eq!(
            *calls.borrow(),
            [
                "a:pki-tomcat",
                "a:pki-tomcat/ca",
                "b:pki-tomcat",
                "b:pki-tomcat/ca",
                "c:pki-tomcat",
                "c:pki-tomcat/ca",
            ]
        );
        assert_eq!(cs_cfg(temp.path(), "pki-tomcat", "ca"), "cs.type=CA\ncms.product.version=1.1\n");

        // Nothing is re-applied once the fleet sits at the target
        calls.borrow_mut().clear();
        sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
            .upgrade()
            .unwrap();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_resumes_from_recorded_index() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "1.0", &[("ca", "1.0")]);
        VersionTracker::subsystem("ca", temp.path().join("etc/pki/pki-tomcat/ca/CS.cfg"))
            .set_index(1)
            .unwrap();
        let calls = Calls::default();
        let catalog = catalog(&calls);

        let scope = Scope {
            instance: None,
            subsystem: Some(SubsystemType::Ca),
        };
        sequencer(temp.path(), &catalog, &AlwaysAbort, scope, "1.1")
            .upgrade()
            .unwrap();

        assert_eq!(*calls.borrow(), ["b:pki-tomcat/ca", "c:pki-tomcat/ca"]);
    }

    #[test]
    fn test_failure_aborts_in_silent_mode() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "1.0", &[("ca", "1.0")]);
        let calls = Calls::default();
        let catalog = UpgradeCatalog::new().with(
            v("1.0"),
            Box::new(Recording {
                name: "a",
                calls: Rc::clone(&calls),
                fail_on: Some("pki-tomcat/ca"),
            }),
        );

        let err = sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
            .upgrade()
            .unwrap_err();

        assert!(format!("{err:#}").contains("pki-tomcat/ca"));
        assert_eq!(cs_cfg(temp.path(), "pki-tomcat", "ca"), "cs.type=CA\ncms.product.version=1.0\n");
        let backup = temp
            .path()
            .join("var/log/pki/upgrade/backup/1.0/1")
            .join(temp.path().strip_prefix("/").unwrap())
            .join("etc/pki/pki-tomcat/ca/CS.cfg");
        assert!(backup.is_file());
    }

    #[test]
    fn test_skipped_unit_is_left_behind() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "1.0", &[("ca", "1.0"), ("kra", "1.0")]);
        let calls = Calls::default();
        let catalog = UpgradeCatalog::new()
            .with(
                v("1.0"),
                Box::new(Recording {
                    name: "a",
                    calls: Rc::clone(&calls),
                    fail_on: Some("pki-tomcat/ca"),
                }),
            )
            .with(v("1.0"), Recording::boxed("b", &calls));

        let report = sequencer(temp.path(), &catalog, &SkipAll, Scope::default(), "1.1")
            .upgrade()
            .unwrap();

        assert_eq!(report.skipped, ["pki-tomcat/ca"]);
        assert!(!report.is_success());
        assert!(!calls.borrow().contains(&"b:pki-tomcat/ca".to_string()));
        assert!(calls.borrow().contains(&"b:pki-tomcat/kra".to_string()));
        assert!(cs_cfg(temp.path(), "pki-tomcat", "kra").contains("cms.product.version=1.1"));
        assert!(cs_cfg(temp.path(), "pki-tomcat", "ca").contains("cms.product.version=1.0"));
    }

    #[test]
    fn test_version_without_scriptlets_advances() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "0.9", &[("ca", "0.9")]);
        let calls = Calls::default();
        let catalog = catalog(&calls);

        let report = sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
            .upgrade()
            .unwrap();

        assert_eq!(report.advanced, 2);
        assert!(cs_cfg(temp.path(), "pki-tomcat", "ca").contains("cms.product.version=1.1"));
    }

    #[test]
    fn test_fleet_minimum() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();
        let catalog = catalog(&calls);

        assert_eq!(
            sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
                .current_version()
                .unwrap(),
            v("1.1")
        );

        fixtures::instance(temp.path(), "pki-a", "0.9", &[("ca", "1.2")]);
        fixtures::instance(temp.path(), "pki-b", "1.2", &[("kra", "1.0")]);

        assert_eq!(
            sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1")
                .current_version()
                .unwrap(),
            v("0.9")
        );

        let scope = Scope {
            instance: None,
            subsystem: Some(SubsystemType::Ca),
        };
        assert_eq!(
            sequencer(temp.path(), &catalog, &AlwaysAbort, scope, "1.1")
                .current_version()
                .unwrap(),
            v("1.2")
        );
    }

    #[test]
    fn test_status_reset_and_remove() {
        let temp = TempDir::new().unwrap();
        fixtures::instance(temp.path(), "pki-tomcat", "1.0", &[("ca", "1.0")]);
        let calls = Calls::default();
        let catalog = catalog(&calls);
        let seq = sequencer(temp.path(), &catalog, &AlwaysAbort, Scope::default(), "1.1");

        assert_eq!(seq.status().unwrap(), ["pki-tomcat: 1.0", "pki-tomcat/ca: 1.0"]);

        assert_eq!(seq.reset_trackers().unwrap(), 2);
        assert_eq!(seq.status().unwrap(), ["pki-tomcat: 1.1", "pki-tomcat/ca: 1.1"]);

        assert_eq!(seq.remove_trackers().unwrap(), 2);
        assert_eq!(cs_cfg(temp.path(), "pki-tomcat", "ca"), "cs.type=CA\n");
    }
}
