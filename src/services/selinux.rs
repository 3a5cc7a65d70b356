//! SELinux label store
//!
//! Records are staged in a transaction and committed in one `semanage import`
//! so a failed deployment never leaves half of its labels behind.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::runner;

pub trait SecurityLabelStore {
    fn is_enabled(&self) -> bool;
    fn begin_transaction(&self) -> Result<Box<dyn LabelTransaction + '_>>;

    /// Relabel existing paths recursively from the loaded policy
    fn restorecon(&self, paths: &[PathBuf]) -> Result<()>;
}

/// Staged label changes, applied together by `commit`
pub trait LabelTransaction {
    fn add_fcontext(&mut self, path: &Path, context: &str);
    fn remove_fcontext(&mut self, path: &Path);
    fn add_port(&mut self, port: u16, context: &str);
    fn remove_port(&mut self, port: u16);
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Label store driven by `semanage` and `restorecon`
#[derive(Debug, Default)]
pub struct SemanageStore;

impl SemanageStore {
    pub fn new() -> Self {
        Self
    }

    /// Whether SELinux tooling is present and the policy is enforced or permissive
    pub fn detect() -> bool {
        runner::command_exists("selinuxenabled") && runner::run_quiet("selinuxenabled", &[])
    }
}

impl SecurityLabelStore for SemanageStore {
    fn is_enabled(&self) -> bool {
        true
    }

    fn begin_transaction(&self) -> Result<Box<dyn LabelTransaction + '_>> {
        Ok(Box::new(SemanageTransaction::default()))
    }

    fn restorecon(&self, paths: &[PathBuf]) -> Result<()> {
        let existing: Vec<String> = paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if existing.is_empty() {
            return Ok(());
        }

        let mut args = vec!["-R"];
        args.extend(existing.iter().map(String::as_str));
        runner::run_capture("restorecon", &args)?;
        Ok(())
    }
}

/// Buffered `semanage import` script
#[derive(Debug, Default)]
pub struct SemanageTransaction {
    commands: Vec<String>,
}

impl SemanageTransaction {
    /// Script passed to `semanage import`
    pub fn script(&self) -> String {
        let mut script = self.commands.join("\n");
        script.push('\n');
        script
    }
}

fn fcontext_spec(path: &Path) -> String {
    format!("'{}(/.*)?'", path.display())
}

impl LabelTransaction for SemanageTransaction {
    fn add_fcontext(&mut self, path: &Path, context: &str) {
        self.commands
            .push(format!("fcontext -a -t {} {}", context, fcontext_spec(path)));
    }

    fn remove_fcontext(&mut self, path: &Path) {
        self.commands
            .push(format!("fcontext -d {}", fcontext_spec(path)));
    }

    fn add_port(&mut self, port: u16, context: &str) {
        self.commands
            .push(format!("port -a -t {} -p tcp {}", context, port));
    }

    fn remove_port(&mut self, port: u16) {
        self.commands.push(format!("port -d -p tcp {}", port));
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if self.commands.is_empty() {
            return Ok(());
        }
        log::info!("committing {} SELinux records", self.commands.len());
        log::debug!("semanage import:\n{}", self.script());
        runner::run_with_input("semanage", &["import"], &self.script())?;
        Ok(())
    }
}

/// Label store for hosts without SELinux
#[derive(Debug, Default)]
pub struct DisabledLabelStore;

struct NoopTransaction;

impl LabelTransaction for NoopTransaction {
    fn add_fcontext(&mut self, _path: &Path, _context: &str) {}
    fn remove_fcontext(&mut self, _path: &Path) {}
    fn add_port(&mut self, _port: u16, _context: &str) {}
    fn remove_port(&mut self, _port: u16) {}
    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl SecurityLabelStore for DisabledLabelStore {
    fn is_enabled(&self) -> bool {
        false
    }

    fn begin_transaction(&self) -> Result<Box<dyn LabelTransaction + '_>> {
        Ok(Box::new(NoopTransaction))
    }

    fn restorecon(&self, _paths: &[PathBuf]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_script() {
        let mut tx = SemanageTransaction::default();
        tx.add_fcontext(Path::new("/var/lib/pki/pki-tomcat"), "pki_tomcat_var_lib_t");
        tx.add_port(8443, "http_port_t");
        tx.remove_fcontext(Path::new("/var/log/pki/pki-tomcat"));
        tx.remove_port(8080);

        assert_eq!(
            tx.script(),
            "fcontext -a -t pki_tomcat_var_lib_t '/var/lib/pki/pki-tomcat(/.*)?'\n\
             port -a -t http_port_t -p tcp 8443\n\
             fcontext -d '/var/log/pki/pki-tomcat(/.*)?'\n\
             port -d -p tcp 8080\n"
        );
    }

    #[test]
    fn test_empty_commit_runs_nothing() {
        let tx: Box<dyn LabelTransaction> = Box::new(SemanageTransaction::default());
        tx.commit().unwrap();
    }

    #[test]
    fn test_disabled_store_is_noop() {
        let store = DisabledLabelStore;
        assert!(!store.is_enabled());

        let mut tx = store.begin_transaction().unwrap();
        tx.add_port(8443, "http_port_t");
        tx.commit().unwrap();
        store.restorecon(&[PathBuf::from("/nonexistent")]).unwrap();
    }
}
