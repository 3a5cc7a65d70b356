//! Contracts for the external tools a deployment drives
//!
//! Layers only talk to these traits. The process-backed implementations live
//! in the submodules; tests swap in recording fakes.

pub mod certdb;
pub mod selinux;
pub mod webserver;

pub use certdb::{CertificateDatabaseService, NssCertDb};
pub use selinux::{DisabledLabelStore, LabelTransaction, SecurityLabelStore, SemanageStore};
pub use webserver::{ServerHandle, SystemdTomcat, WebServerControl};

/// Runs an external tool with arguments, returning captured stdout
pub type Exec = Box<dyn Fn(&str, &[String]) -> anyhow::Result<String>>;

/// Exec backed by real processes
pub fn system_exec() -> Exec {
    Box::new(|cmd: &str, args: &[String]| {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        crate::runner::run_capture(cmd, &args)
    })
}

/// The external collaborators of one run
pub struct Services {
    pub certdb: Box<dyn CertificateDatabaseService>,
    pub server: Box<dyn WebServerControl>,
    pub labels: Box<dyn SecurityLabelStore>,
}

impl Services {
    /// Real tools; SELinux support only when the host has it enabled
    pub fn system() -> Self {
        let labels: Box<dyn SecurityLabelStore> = if SemanageStore::detect() {
            Box::new(SemanageStore::new())
        } else {
            log::debug!("SELinux disabled or tools missing; label changes are no-ops");
            Box::new(DisabledLabelStore)
        };

        Self {
            certdb: Box::new(NssCertDb::new(system_exec())),
            server: Box::new(SystemdTomcat::new(system_exec())),
            labels,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("selinux", &self.labels.is_enabled())
            .finish_non_exhaustive()
    }
}
