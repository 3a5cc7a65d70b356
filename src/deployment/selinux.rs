//! SELinux labels for an instance's trees and ports
//!
//! Records are instance-wide: added when the first subsystem arrives and
//! removed when the last one leaves. Relabeling runs on every pass.

use anyhow::Result;
use scriptlet::Scriptlet;
use std::path::PathBuf;

use super::Deployer;
use crate::services::LabelTransaction;

pub const NAME: &str = "selinux_setup";

/// Directory key and the file context it is labeled with
const FCONTEXTS: [(&str, &str); 4] = [
    ("pki_instance_path", "pki_tomcat_var_lib_t"),
    ("pki_instance_log_path", "pki_tomcat_log_t"),
    ("pki_instance_configuration_path", "pki_tomcat_etc_rw_t"),
    ("pki_database_path", "pki_tomcat_cert_t"),
];

const PORTS: [&str; 4] = [
    "pki_http_port",
    "pki_https_port",
    "pki_ajp_port",
    "pki_tomcat_server_port",
];

const PORT_CONTEXT: &str = "http_port_t";

#[derive(Debug)]
pub struct SelinuxSetup;

enum Change {
    Add,
    Remove,
}

fn labeled_paths(deployer: &Deployer) -> Result<Vec<PathBuf>> {
    FCONTEXTS.iter().map(|(key, _)| deployer.path(key)).collect()
}

fn ports(deployer: &Deployer) -> Result<Vec<u16>> {
    PORTS
        .iter()
        .map(|key| Ok(deployer.config.number::<u16>(key)?))
        .collect()
}

fn stage(deployer: &Deployer, tx: &mut dyn LabelTransaction, change: &Change) -> Result<usize> {
    for (key, context) in FCONTEXTS {
        let path = deployer.path(key)?;
        match change {
            Change::Add => tx.add_fcontext(&path, context),
            Change::Remove => tx.remove_fcontext(&path),
        }
    }
    let ports = ports(deployer)?;
    for port in &ports {
        match change {
            Change::Add => tx.add_port(*port, PORT_CONTEXT),
            Change::Remove => tx.remove_port(*port),
        }
    }
    Ok(FCONTEXTS.len() + ports.len())
}

fn apply(deployer: &Deployer, change: &Change) -> Result<()> {
    let (verb, done) = match change {
        Change::Add => ("add", "added"),
        Change::Remove => ("remove", "removed"),
    };
    if deployer.dry_run() {
        log::info!(
            "[dry-run] would {verb} SELinux records for {}",
            deployer.config.instance_name()?
        );
        return Ok(());
    }

    let mut tx = deployer.services.labels.begin_transaction()?;
    let staged = stage(deployer, tx.as_mut(), change)?;
    tx.commit()?;
    log::info!("{NAME}: {done} {staged} SELinux records");
    Ok(())
}

fn relabel(deployer: &Deployer) -> Result<()> {
    if deployer.dry_run() {
        return Ok(());
    }
    deployer.services.labels.restorecon(&labeled_paths(deployer)?)
}

/// Whether this layer has anything to do on this host
fn active(deployer: &Deployer) -> Result<bool> {
    if deployer.skip_installation(NAME)? || !deployer.tomcat_only(NAME) {
        return Ok(false);
    }
    if !deployer.services.labels.is_enabled() {
        log::debug!("{NAME}: SELinux is disabled");
        return Ok(false);
    }
    Ok(true)
}

impl Scriptlet<Deployer> for SelinuxSetup {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if !active(deployer)? {
            return Ok(());
        }
        // The configuration layer registers last, so a first spawn still counts zero
        if deployer.instance_count()? == 0 {
            apply(deployer, &Change::Add)?;
        } else {
            log::debug!("{NAME}: instance already labeled");
        }
        relabel(deployer)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if !active(deployer)? {
            return Ok(());
        }
        relabel(deployer)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if !active(deployer)? {
            return Ok(());
        }
        if deployer.unreferenced(deployer.instance_count()?) {
            apply(deployer, &Change::Remove)?;
        }
        relabel(deployer)
    }
}
