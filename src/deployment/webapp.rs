//! The subsystem's web application

use anyhow::Result;
use scriptlet::Scriptlet;

use super::Deployer;

pub const NAME: &str = "webapp_deployment";

#[derive(Debug)]
pub struct WebAppDeployment;

impl WebAppDeployment {
    fn deploy(deployer: &Deployer, refresh: bool) -> Result<()> {
        if !deployer.tomcat_only(NAME) {
            return Ok(());
        }
        deployer.ops.directory().overwrite(refresh).copy(
            &deployer.path("pki_source_webapps_path")?,
            &deployer.path("pki_tomcat_webapps_subsystem_path")?,
        )?;
        Ok(())
    }
}

impl Scriptlet<Deployer> for WebAppDeployment {
    fn name(&self) -> &'static str {
        NAME
    }

    fn spawn(&self, deployer: &Deployer) -> Result<()> {
        Self::deploy(deployer, false)
    }

    fn respawn(&self, deployer: &Deployer) -> Result<()> {
        Self::deploy(deployer, true)
    }

    fn destroy(&self, deployer: &Deployer) -> Result<()> {
        if !deployer.tomcat_only(NAME) {
            return Ok(());
        }
        deployer
            .ops
            .directory()
            .delete(&deployer.path("pki_tomcat_webapps_subsystem_path")?)?;
        Ok(())
    }
}
