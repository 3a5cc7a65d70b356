//! Versioned upgrades of deployed instances and subsystems
//!
//! Every unit carries a [`VersionTracker`]. The [`UpgradeSequencer`] applies
//! the [`UpgradeCatalog`] in version and index order until each unit reaches
//! the release this binary was built as.

pub mod catalog;
pub mod policy;
mod scriptlets;
pub mod sequencer;
pub mod tracker;
pub mod unit;
pub mod version;

pub use catalog::{UpgradeCatalog, UpgradeScriptlet, UpgradeStep};
pub use policy::{AlwaysAbort, ContinuePolicy, PromptOperator};
pub use sequencer::{UpgradeReport, UpgradeSequencer};
pub use tracker::VersionTracker;
pub use unit::{Instance, Scope, Subsystem, Unit, UpgradePaths};
pub use version::Version;

/// Release this binary upgrades to and stamps on new deployments
pub fn target_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::baseline())
}
