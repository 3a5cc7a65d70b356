//! Web-server process control

use anyhow::{Result, bail};
use indicatif::ProgressBar;
use std::thread;
use std::time::{Duration, Instant};

use super::Exec;
use crate::config::ConfigurationContext;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Which server process to control and where it reports readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    pub service: String,
    pub status_url: String,
}

impl ServerHandle {
    /// `http://<host>:<port>/<sub>/admin/<sub>/getStatus`
    pub fn from_context(ctx: &ConfigurationContext) -> Result<Self> {
        let sub = ctx.subsystem().dir_name();
        Ok(Self {
            service: ctx.get("pki_tomcat_service")?.to_string(),
            status_url: format!(
                "http://{}:{}/{sub}/admin/{sub}/getStatus",
                ctx.get("pki_hostname")?,
                ctx.get("pki_http_port")?,
            ),
        })
    }
}

pub trait WebServerControl {
    fn start(&self, server: &ServerHandle) -> Result<()>;
    fn stop(&self, server: &ServerHandle) -> Result<()>;
    fn restart(&self, server: &ServerHandle) -> Result<()>;

    /// Block until the status URL answers; running out of time is an error
    fn wait_for_startup(&self, server: &ServerHandle, timeout: Duration) -> Result<()>;
}

/// Tomcat instance managed as a systemd template unit
pub struct SystemdTomcat {
    exec: Exec,
}

impl SystemdTomcat {
    pub fn new(exec: Exec) -> Self {
        Self { exec }
    }

    fn systemctl(&self, action: &str, server: &ServerHandle) -> Result<()> {
        log::info!("systemctl {} {}", action, server.service);
        (self.exec)("systemctl", &[action.to_string(), server.service.clone()])?;
        Ok(())
    }
}

impl WebServerControl for SystemdTomcat {
    fn start(&self, server: &ServerHandle) -> Result<()> {
        self.systemctl("start", server)
    }

    fn stop(&self, server: &ServerHandle) -> Result<()> {
        self.systemctl("stop", server)
    }

    fn restart(&self, server: &ServerHandle) -> Result<()> {
        self.systemctl("restart", server)
    }

    fn wait_for_startup(&self, server: &ServerHandle, timeout: Duration) -> Result<()> {
        poll_status(&server.status_url, timeout)
    }
}

/// Poll `url` until it answers with a success status
pub fn poll_status(url: &str, timeout: Duration) -> Result<()> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(POLL_INTERVAL))
        .build()
        .into();

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Waiting for {url}"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let deadline = Instant::now() + timeout;
    loop {
        match agent.get(url).call() {
            Ok(_) => {
                spinner.finish_and_clear();
                log::info!("server answered at {}", url);
                return Ok(());
            }
            Err(e) => log::debug!("server not ready at {}: {}", url, e),
        }

        if Instant::now() >= deadline {
            spinner.finish_and_clear();
            bail!(
                "Server did not start within {}s (no answer from {})",
                timeout.as_secs(),
                url
            );
        }
        thread::sleep(POLL_INTERVAL);
    }
}
