//! Test fixtures: a template tree under a temporary root and recording services

use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

use super::Deployer;
use crate::config::{ComposeOptions, ConfigSources};
use crate::resource::{Ownership, ResourceOps};
use crate::services::{
    CertificateDatabaseService, LabelTransaction, SecurityLabelStore, ServerHandle, Services,
    WebServerControl,
};
use crate::subsystem::SubsystemType;
use scriptlet::Phase;

pub type Calls = Rc<RefCell<Vec<String>>>;

const CS_CFG: &str = "\
cs.type=[PKI_SUBSYSTEM]
instanceId=[PKI_INSTANCE_NAME]
machineName=[PKI_HOSTNAME]
service.securePort=[PKI_HTTPS_PORT]
";

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn put(path: PathBuf, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Temporary root holding the shipped templates
pub struct Fixture {
    temp: TempDir,
    calls: Calls,
    selinux: bool,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let share = temp.path().join("usr/share/pki");

        for sub in ["ca", "kra", "ocsp", "tks", "tps", "ra"] {
            put(share.join(sub).join("conf/CS.cfg"), CS_CFG);
            put(
                share.join(sub).join("webapps").join(sub).join("WEB-INF/web.xml"),
                "<web-app/>\n",
            );
        }
        for name in ["flatfile.txt", "registry.cfg"] {
            put(share.join("ca/conf").join(name), name);
        }
        for profile in ["admincert", "caauditsigningcert", "cacert", "caocspcert", "servercert", "subsystemcert"] {
            put(share.join("ca/conf").join(format!("{profile}.profile")), profile);
        }
        for profile in ["servercert", "storagecert", "subsystemcert", "transportcert"] {
            put(share.join("kra/conf").join(format!("{profile}.profile")), profile);
        }
        put(share.join("ca/emails/certIssued_CA.html"), "<html/>\n");
        put(share.join("ca/profiles/ca/caUserCert.cfg"), "desc=user\n");
        put(share.join("server/webapps/ROOT/WEB-INF/web.xml"), "<web-app/>\n");
        fs::create_dir_all(temp.path().join("usr/share/tomcat/bin")).unwrap();

        Self {
            temp,
            calls: Calls::default(),
            selinux: true,
        }
    }

    /// Same templates on a host where SELinux is disabled
    pub fn without_selinux() -> Self {
        Self {
            selinux: false,
            ..Self::new()
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Every external call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn deployer(&self, subsystem: SubsystemType, phase: Phase, dry_run: bool) -> Deployer {
        self.deployer_with(subsystem, phase, dry_run, "")
    }

    /// Deployer with extra `[DEFAULT]` lines layered over the defaults
    pub fn deployer_with(
        &self,
        subsystem: SubsystemType,
        phase: Phase,
        dry_run: bool,
        extra: &str,
    ) -> Deployer {
        let overlay = ConfigSources::parse(
            &format!("[DEFAULT]\npki_pin = \"Secret.123\"\n{extra}\n"),
            "test overlay",
        )
        .unwrap();
        let sources = ConfigSources::defaults().unwrap().overlay(overlay);

        let mut options = ComposeOptions::new(phase);
        options.dry_run = dry_run;
        options.root_prefix = Some(self.root().to_path_buf());
        let config = sources.compose(subsystem, &options).unwrap();

        Deployer::from_parts(
            config,
            ResourceOps::new(dry_run, Ownership::current()),
            self.services(),
        )
    }

    pub fn services(&self) -> Services {
        Services {
            certdb: Box::new(FakeCertDb(Rc::clone(&self.calls))),
            server: Box::new(FakeServer(Rc::clone(&self.calls))),
            labels: Box::new(FakeLabels {
                calls: Rc::clone(&self.calls),
                enabled: self.selinux,
            }),
        }
    }
}

fn record(calls: &Calls, call: String) {
    calls.borrow_mut().push(call);
}

struct FakeCertDb(Calls);

impl CertificateDatabaseService for FakeCertDb {
    fn create_database(&self, db: &Path, _password_file: &Path) -> Result<()> {
        record(&self.0, format!("certdb create {}", db.display()));
        fs::write(db.join("cert9.db"), "")?;
        Ok(())
    }

    fn add_cert(&self, _db: &Path, nickname: &str, _cert_file: &Path, _trust: &str) -> Result<()> {
        record(&self.0, format!("certdb add {nickname}"));
        Ok(())
    }

    fn remove_cert(&self, _db: &Path, nickname: &str) -> Result<()> {
        record(&self.0, format!("certdb remove {nickname}"));
        Ok(())
    }

    fn get_cert(&self, _db: &Path, _nickname: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn create_csr(&self, _db: &Path, _pw: &Path, dn: &str, _noise: &Path, _out: &Path) -> Result<()> {
        record(&self.0, format!("certdb csr {dn}"));
        Ok(())
    }

    fn import_pkcs12(&self, _db: &Path, _pw: &Path, p12: &Path, _p12_pw: &Path) -> Result<()> {
        record(&self.0, format!("certdb import {}", p12.display()));
        Ok(())
    }

    fn export_pkcs12(&self, _db: &Path, _pw: &Path, nick: &str, _p12: &Path, _p12_pw: &Path) -> Result<()> {
        record(&self.0, format!("certdb export {nick}"));
        Ok(())
    }
}

struct FakeServer(Calls);

impl WebServerControl for FakeServer {
    fn start(&self, server: &ServerHandle) -> Result<()> {
        record(&self.0, format!("server start {}", server.service));
        Ok(())
    }

    fn stop(&self, server: &ServerHandle) -> Result<()> {
        record(&self.0, format!("server stop {}", server.service));
        Ok(())
    }

    fn restart(&self, server: &ServerHandle) -> Result<()> {
        record(&self.0, format!("server restart {}", server.service));
        Ok(())
    }

    fn wait_for_startup(&self, server: &ServerHandle, _timeout: Duration) -> Result<()> {
        record(&self.0, format!("server wait {}", server.status_url));
        Ok(())
    }
}

struct FakeLabels {
    calls: Calls,
    enabled: bool,
}

struct FakeTransaction(Calls);

impl SecurityLabelStore for FakeLabels {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn begin_transaction(&self) -> Result<Box<dyn LabelTransaction + '_>> {
        Ok(Box::new(FakeTransaction(Rc::clone(&self.calls))))
    }

    fn restorecon(&self, _paths: &[PathBuf]) -> Result<()> {
        record(&self.calls, "selinux restorecon".to_string());
        Ok(())
    }
}

impl LabelTransaction for FakeTransaction {
    fn add_fcontext(&mut self, path: &Path, context: &str) {
        record(&self.0, format!("selinux add fcontext {} {context}", path.display()));
    }

    fn remove_fcontext(&mut self, path: &Path) {
        record(&self.0, format!("selinux remove fcontext {}", path.display()));
    }

    fn add_port(&mut self, port: u16, context: &str) {
        record(&self.0, format!("selinux add port {port} {context}"));
    }

    fn remove_port(&mut self, port: u16) {
        record(&self.0, format!("selinux remove port {port}"));
    }

    fn commit(self: Box<Self>) -> Result<()> {
        record(&self.0, "selinux commit".to_string());
        Ok(())
    }
}
