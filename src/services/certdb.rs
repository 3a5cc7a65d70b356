//! NSS certificate database tooling
//!
//! Thin wrappers around `certutil` and `pk12util`. Any nonzero exit is fatal
//! for the caller and surfaces the tool's output through
//! [`crate::runner::ProcessError`].

use anyhow::Result;
use std::path::Path;

use super::Exec;
use crate::runner::ProcessError;

pub trait CertificateDatabaseService {
    /// Create an empty database protected by the password in `password_file`
    fn create_database(&self, db: &Path, password_file: &Path) -> Result<()>;

    /// Import a PEM/DER certificate under `nickname` with NSS `trust` flags
    fn add_cert(&self, db: &Path, nickname: &str, cert_file: &Path, trust: &str) -> Result<()>;

    fn remove_cert(&self, db: &Path, nickname: &str) -> Result<()>;

    /// PEM of `nickname`, or `None` when the database has no such certificate
    fn get_cert(&self, db: &Path, nickname: &str) -> Result<Option<String>>;

    /// Generate a key pair and write a PEM request to `output`
    fn create_csr(
        &self,
        db: &Path,
        password_file: &Path,
        subject_dn: &str,
        noise_file: &Path,
        output: &Path,
    ) -> Result<()>;

    fn import_pkcs12(
        &self,
        db: &Path,
        password_file: &Path,
        pkcs12: &Path,
        pkcs12_password_file: &Path,
    ) -> Result<()>;

    fn export_pkcs12(
        &self,
        db: &Path,
        password_file: &Path,
        nickname: &str,
        pkcs12: &Path,
        pkcs12_password_file: &Path,
    ) -> Result<()>;
}

/// `certutil`/`pk12util` backed database
pub struct NssCertDb {
    exec: Exec,
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

impl NssCertDb {
    pub fn new(exec: Exec) -> Self {
        Self { exec }
    }

    fn certutil(&self, args: Vec<String>) -> Result<String> {
        (self.exec)("certutil", &args)
    }

    fn pk12util(&self, args: Vec<String>) -> Result<String> {
        (self.exec)("pk12util", &args)
    }
}

impl CertificateDatabaseService for NssCertDb {
    fn create_database(&self, db: &Path, password_file: &Path) -> Result<()> {
        log::info!("creating NSS database in {}", db.display());
        self.certutil(vec![
            "-N".into(),
            "-d".into(),
            arg(db),
            "-f".into(),
            arg(password_file),
        ])?;
        Ok(())
    }

    fn add_cert(&self, db: &Path, nickname: &str, cert_file: &Path, trust: &str) -> Result<()> {
        self.certutil(vec![
            "-A".into(),
            "-d".into(),
            arg(db),
            "-n".into(),
            nickname.into(),
            "-t".into(),
            trust.into(),
            "-i".into(),
            arg(cert_file),
        ])?;
        Ok(())
    }

    fn remove_cert(&self, db: &Path, nickname: &str) -> Result<()> {
        self.certutil(vec![
            "-D".into(),
            "-d".into(),
            arg(db),
            "-n".into(),
            nickname.into(),
        ])?;
        Ok(())
    }

    fn get_cert(&self, db: &Path, nickname: &str) -> Result<Option<String>> {
        let result = self.certutil(vec![
            "-L".into(),
            "-d".into(),
            arg(db),
            "-n".into(),
            nickname.into(),
            "-a".into(),
        ]);
        match result {
            Ok(pem) => Ok(Some(pem)),
            Err(e) => match e.downcast_ref::<ProcessError>() {
                Some(p) if p.stderr.to_lowercase().contains("could not find") => Ok(None),
                _ => Err(e),
            },
        }
    }

    fn create_csr(
        &self,
        db: &Path,
        password_file: &Path,
        subject_dn: &str,
        noise_file: &Path,
        output: &Path,
    ) -> Result<()> {
        self.certutil(vec![
            "-R".into(),
            "-d".into(),
            arg(db),
            "-f".into(),
            arg(password_file),
            "-s".into(),
            subject_dn.into(),
            "-z".into(),
            arg(noise_file),
            "-o".into(),
            arg(output),
            "-a".into(),
        ])?;
        Ok(())
    }

    fn import_pkcs12(
        &self,
        db: &Path,
        password_file: &Path,
        pkcs12: &Path,
        pkcs12_password_file: &Path,
    ) -> Result<()> {
        self.pk12util(vec![
            "-i".into(),
            arg(pkcs12),
            "-d".into(),
            arg(db),
            "-k".into(),
            arg(password_file),
            "-w".into(),
            arg(pkcs12_password_file),
        ])?;
        Ok(())
    }

    fn export_pkcs12(
        &self,
        db: &Path,
        password_file: &Path,
        nickname: &str,
        pkcs12: &Path,
        pkcs12_password_file: &Path,
    ) -> Result<()> {
        self.pk12util(vec![
            "-o".into(),
            arg(pkcs12),
            "-n".into(),
            nickname.into(),
            "-d".into(),
            arg(db),
            "-k".into(),
            arg(password_file),
            "-w".into(),
            arg(pkcs12_password_file),
        ])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<String>>>;

    fn recording(calls: &Calls, reply: Result<String, &'static str>) -> Exec {
        let calls = Rc::clone(calls);
        Box::new(move |cmd: &str, args: &[String]| {
            calls.borrow_mut().push(format!("{} {}", cmd, args.join(" ")));
            match &reply {
                Ok(out) => Ok(out.clone()),
                Err(stderr) => Err(ProcessError {
                    command: cmd.to_string(),
                    status: "exit 255".to_string(),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }
                .into()),
            }
        })
    }

    #[test]
    fn test_create_database_args() {
        let calls = Calls::default();
        let db = NssCertDb::new(recording(&calls, Ok(String::new())));

        db.create_database(Path::new("/etc/pki/pki-tomcat/alias"), Path::new("/tmp/pw"))
            .unwrap();

        assert_eq!(
            calls.borrow()[0],
            "certutil -N -d /etc/pki/pki-tomcat/alias -f /tmp/pw"
        );
    }

    #[test]
    fn test_pkcs12_args() {
        let calls = Calls::default();
        let db = NssCertDb::new(recording(&calls, Ok(String::new())));
        let alias = Path::new("/alias");

        db.export_pkcs12(alias, Path::new("/pw"), "caSigningCert", Path::new("/ca.p12"), Path::new("/p12pw"))
            .unwrap();
        db.import_pkcs12(alias, Path::new("/pw"), Path::new("/ca.p12"), Path::new("/p12pw"))
            .unwrap();

        assert_eq!(
            *calls.borrow(),
            [
                "pk12util -o /ca.p12 -n caSigningCert -d /alias -k /pw -w /p12pw",
                "pk12util -i /ca.p12 -d /alias -k /pw -w /p12pw",
            ]
        );
    }

    #[test]
    fn test_get_cert_missing_is_none() {
        let calls = Calls::default();
        let db = NssCertDb::new(recording(
            &calls,
            Err("certutil: Could not find cert: auditSigningCert"),
        ));

        assert_eq!(db.get_cert(Path::new("/alias"), "auditSigningCert").unwrap(), None);
    }

    #[test]
    fn test_failure_surfaces_stderr() {
        let calls = Calls::default();
        let db = NssCertDb::new(recording(&calls, Err("SEC_ERROR_BAD_DATABASE")));

        let err = db.remove_cert(Path::new("/alias"), "x").unwrap_err();
        assert!(err.to_string().contains("SEC_ERROR_BAD_DATABASE"));
    }
}
