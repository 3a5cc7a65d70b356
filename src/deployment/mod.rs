//! Deployment layers
//!
//! A deployment is an ordered list of layer scriptlets run over one
//! [`Deployer`]. Spawn builds the layers bottom-up, destroy tears them down
//! top-down. Layers that share resources with sibling subsystems re-count the
//! registered subsystems on disk before removing anything.

mod configuration;
mod infrastructure;
mod instance;
pub mod registry;
mod selinux;
mod subsystem;
#[cfg(test)]
pub(crate) mod testing;
mod webapp;
mod webserver;

use anyhow::{Context, Result};
use scriptlet::{ProgressCallback, Registry, SequenceReport, Sequencer, parse_list};
use std::path::{Path, PathBuf};

use crate::config::ConfigurationContext;
use crate::resource::ResourceOps;
use crate::services::Services;
use crate::subsystem::WebServerFamily;
use registry::DeploymentRegistry;

/// Configuration key listing the layers to run
pub const SCRIPTLETS_KEY: &str = "pki_spawn_scriptlets";

/// Everything a layer needs: the composed configuration, the filesystem
/// primitives and the external tools
#[derive(Debug)]
pub struct Deployer {
    pub config: ConfigurationContext,
    pub ops: ResourceOps,
    pub services: Services,
}

impl Deployer {
    /// Resource ownership is resolved from `pki_user`/`pki_group`
    pub fn new(config: ConfigurationContext, services: Services) -> Result<Self> {
        let ops = ResourceOps::from_context(&config)?;
        Ok(Self::from_parts(config, ops, services))
    }

    pub fn from_parts(config: ConfigurationContext, ops: ResourceOps, services: Services) -> Self {
        Self {
            config,
            ops,
            services,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.config.dry_run()
    }

    pub fn path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.config.path(key)?)
    }

    pub fn registry(&self) -> Result<DeploymentRegistry> {
        Ok(DeploymentRegistry::from_context(&self.config)?)
    }

    /// Subsystems registered in this subsystem's instance, same family only
    pub fn instance_count(&self) -> Result<usize> {
        self.registry()?
            .count_instance(self.config.family(), self.config.instance_name()?)
    }

    /// Subsystems of any family sharing this instance's name, and so its trees
    pub fn shared_instance_count(&self) -> Result<usize> {
        self.registry()?.count_named(self.config.instance_name()?)
    }

    /// Whether a shared resource counted at `count` has no remaining users
    ///
    /// A dry run never deregisters the current subsystem, so it still counts
    /// itself.
    pub fn unreferenced(&self, count: usize) -> bool {
        let threshold = usize::from(self.dry_run());
        count == threshold
    }

    /// `true` when installation layers are switched off for this run
    pub fn skip_installation(&self, layer: &str) -> Result<bool> {
        let skip = self.config.flag("pki_skip_installation")?;
        if skip {
            log::info!("{layer}: installation skipped (pki_skip_installation)");
        }
        Ok(skip)
    }

    /// `true` when the subsystem runs under Tomcat; logs otherwise
    pub fn tomcat_only(&self, layer: &str) -> bool {
        if self.config.family() == WebServerFamily::Tomcat {
            return true;
        }
        log::warn!(
            "{layer}: {} web-server support is not yet implemented for {}",
            self.config.family(),
            self.config.subsystem()
        );
        false
    }
}

/// Create each of `keys`' directories with the given mode
pub(crate) fn create_dirs(deployer: &Deployer, keys: &[&str], mode: u32) -> Result<()> {
    for key in keys {
        deployer
            .ops
            .directory()
            .mode(mode)
            .create(&deployer.path(key)?)?;
    }
    Ok(())
}

/// Re-apply attributes to each of `keys`' directories, creating missing ones
pub(crate) fn refresh_dirs(deployer: &Deployer, keys: &[&str], mode: u32) -> Result<()> {
    for key in keys {
        deployer
            .ops
            .directory()
            .mode(mode)
            .overwrite(true)
            .create(&deployer.path(key)?)?;
    }
    Ok(())
}

pub(crate) fn delete_dirs(deployer: &Deployer, keys: &[&str]) -> Result<()> {
    for key in keys {
        deployer.ops.directory().delete(&deployer.path(key)?)?;
    }
    Ok(())
}

/// Link `<dir>/<name>` to the path configured under `key`
pub(crate) fn link_into(deployer: &Deployer, dir: &Path, links: &[(&str, &str)]) -> Result<()> {
    for (name, key) in links {
        deployer
            .ops
            .symlink()
            .create(&deployer.path(key)?, &dir.join(name))?;
    }
    Ok(())
}

/// Every layer, by the name configuration refers to it
pub fn scriptlets() -> Registry<Deployer> {
    Registry::new()
        .register(infrastructure::NAME, || {
            Box::new(infrastructure::InfrastructureLayout)
        })
        .register(instance::NAME, || Box::new(instance::InstanceLayout))
        .register(subsystem::NAME, || Box::new(subsystem::SubsystemLayout))
        .register(webserver::NAME, || Box::new(webserver::WebServerLayout))
        .register(selinux::NAME, || Box::new(selinux::SelinuxSetup))
        .register(webapp::NAME, || Box::new(webapp::WebAppDeployment))
        .register(configuration::NAME, || {
            Box::new(configuration::Configuration)
        })
}

/// Layer names in configured (spawn) order
pub fn configured_scriptlets(config: &ConfigurationContext) -> Result<Vec<String>> {
    Ok(parse_list(config.get(SCRIPTLETS_KEY)?))
}

/// Resolve the configured layers and run the context's phase over them
///
/// Every configured name is resolved before the first layer runs.
pub fn run(deployer: &Deployer, progress: &mut impl ProgressCallback) -> Result<SequenceReport> {
    let names = configured_scriptlets(&deployer.config)?;
    let layers = scriptlets()
        .resolve_all(&names)
        .with_context(|| format!("Invalid {SCRIPTLETS_KEY}"))?;

    let report = Sequencer::new(&layers).run(deployer.config.phase(), deployer, progress)?;
    Ok(report)
}
