//! Tomcat tree shared by the subsystems of one instance

use anyhow::Result;
use scriptlet::Scriptlet;
use std::path::PathBuf;

use super::{Deployer, create_dirs, delete_dirs, link_into, refresh_dirs};
use crate::resource::DEFAULT_DIR_MODE;
use crate::services::ServerHandle;

pub const NAME: &str = "webserver_layout";

const DIRS: [&str; 5] = [
    "pki_tomcat_common_lib_path",
    "pki_tomcat_work_path",
    "pki_tomcat_temp_path",
    "pki_tomcat_webapps_path",
    "pki_tomcat_webapps_root_path",
];

/// `<instance>/<name>` -> configured path
const LINKS: [(&str, &str); 3] = [
    ("conf", "pki_instance_configuration_path"),
    ("logs", "pki_instance_log_path"),
    ("bin", "pki_tomcat_bin_path"),
];

fn web_xml(deployer: &Deployer) -> Result<(PathBuf, PathBuf)> {
    Ok((
        deployer.path("pki_source_web_xml")?,
        deployer
            .path("pki_tomcat_webapps_root_path")?
            .join("WEB-INF")
            .join("web.xml"),
    ))
}

#[derive(Debug)]
pub struct WebServerLayout;

impl Scriptlet<Deployer> for WebServerLayout {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? || !deployer.tomcat_only(NAME) {
            return Ok(());
        }
        create_dirs(deployer, &DIRS, DEFAULT_DIR_MODE)?;
        let (src, dst) = web_xml(deployer)?;
        deployer.ops.file().copy(&src, &dst)?;
        link_into(deployer, &deployer.path("pki_instance_path")?, &LINKS)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? || !deployer.tomcat_only(NAME) {
            return Ok(());
        }
        refresh_dirs(deployer, &DIRS, DEFAULT_DIR_MODE)?;
        let (src, dst) = web_xml(deployer)?;
        deployer.ops.file().overwrite(true).copy(&src, &dst)?;
        link_into(deployer, &deployer.path("pki_instance_path")?, &LINKS)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if deployer.skip_installation(NAME)? || !deployer.tomcat_only(NAME) {
            return Ok(());
        }

        let count = deployer.instance_count()?;
        if deployer.unreferenced(count) {
            let instance = deployer.path("pki_instance_path")?;
            for (name, _) in LINKS {
                deployer.ops.symlink().delete(&instance.join(name))?;
            }
            return delete_dirs(deployer, &DIRS);
        }

        // Siblings keep running in the instance the configuration layer stopped
        if deployer.dry_run() {
            log::info!(
                "[dry-run] would restart {} for {count} remaining subsystems",
                deployer.config.instance_name()?
            );
        } else if !deployer.config.flag("pki_skip_configuration")? {
            let server = ServerHandle::from_context(&deployer.config)?;
            deployer.services.server.restart(&server)?;
        }
        Ok(())
    }
}
