// file: src/system/service.rs
// version: 1.0.0
// guid: 6ecfabe8-30d7-49cd-a163-2b12b946c3d9

//! Applying written configuration to the running system

use super::exec::{CommandRunner, ExecResult};
use crate::error::{MeshError, Result};
use tracing::{info, warn};

/// Commands the tool shells out to
pub const REQUIRED_COMMANDS: [&str; 6] = ["ip", "ifreload", "ovs-vsctl", "systemctl", "vtysh", "hostnamectl"];

/// Drives ifupdown2, systemd and FRR through a [`CommandRunner`]
pub struct ServiceManager<'a> {
    runner: &'a dyn CommandRunner,
    frr_service: String,
}

impl<'a> ServiceManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, frr_service: impl Into<String>) -> Self {
        Self {
            runner,
            frr_service: frr_service.into(),
        }
    }

    /// `ifreload -a`
    pub async fn reload_network(&self) -> Result<()> {
        info!("Reloading network configuration");
        self.runner.run_checked("ifreload", &["-a"]).await?;
        Ok(())
    }

    /// Enable and restart the routing daemon
    pub async fn restart_frr(&self) -> Result<()> {
        info!("Restarting {}", self.frr_service);
        self.runner
            .run_checked("systemctl", &["enable", &self.frr_service])
            .await?;
        self.runner
            .run_checked("systemctl", &["restart", &self.frr_service])
            .await?;
        Ok(())
    }

    /// One reload attempt of everything. Files on disk are not touched, so a
    /// failure here is reported as [`MeshError::ApplyFailed`] and can be
    /// retried on its own.
    pub async fn reload_all(&self, with_frr: bool) -> Result<()> {
        let mut failures = Vec::new();

        if let Err(e) = self.reload_network().await {
            warn!("Network reload failed: {}", e);
            failures.push(e.to_string());
        }
        if with_frr {
            if let Err(e) = self.restart_frr().await {
                warn!("FRR restart failed: {}", e);
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            info!("Live configuration reloaded");
            Ok(())
        } else {
            Err(MeshError::apply_failed(failures.join("; ")))
        }
    }

    /// `vtysh -c "show running-config"`
    pub async fn running_config(&self) -> Result<String> {
        let result = self
            .runner
            .run_checked("vtysh", &["-c", "show running-config"])
            .await?;
        Ok(result.stdout)
    }

    /// `ovs-vsctl show`
    pub async fn ovs_show(&self) -> Result<String> {
        let result = self.runner.run_checked("ovs-vsctl", &["show"]).await?;
        Ok(result.stdout)
    }

    /// Whether `ip link show <name>` succeeds
    pub async fn link_present(&self, name: &str) -> Result<bool> {
        let result: ExecResult = self.runner.run("ip", &["link", "show", name]).await?;
        Ok(result.success())
    }

    /// `hostnamectl set-hostname <name>`
    pub async fn set_hostname(&self, hostname: &str) -> Result<()> {
        info!("Setting system hostname to {}", hostname);
        self.runner
            .run_checked("hostnamectl", &["set-hostname", hostname])
            .await
            .map_err(|e| MeshError::apply_failed(e.to_string()))?;
        Ok(())
    }
}

/// Host facts
pub struct SystemUtils;

impl SystemUtils {
    /// Check if running as root
    pub fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    /// Current short hostname of this host
    pub fn current_hostname() -> Result<String> {
        let raw = std::fs::read_to_string("/proc/sys/kernel/hostname")
            .or_else(|_| std::fs::read_to_string("/etc/hostname"))
            .map_err(|e| MeshError::system(format!("Failed to read hostname: {}", e)))?;
        let full = raw.trim();
        Ok(full.split('.').next().unwrap_or(full).to_string())
    }

    /// Commands from [`REQUIRED_COMMANDS`] that are not on PATH
    pub fn missing_commands() -> Vec<String> {
        REQUIRED_COMMANDS
            .iter()
            .filter(|cmd| which::which(cmd).is_err())
            .map(|cmd| cmd.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::exec::RecordingRunner;

    #[tokio::test]
    async fn test_reload_all_runs_in_order() {
        let runner = RecordingRunner::new();
        let services = ServiceManager::new(&runner, "frr.service");
        services.reload_all(true).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "ifreload -a".to_string(),
                "systemctl enable frr.service".to_string(),
                "systemctl restart frr.service".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_without_frr() {
        let runner = RecordingRunner::new();
        let services = ServiceManager::new(&runner, "frr.service");
        services.reload_all(false).await.unwrap();
        assert_eq!(runner.calls(), vec!["ifreload -a".to_string()]);
    }

    #[tokio::test]
    async fn test_reload_failure_is_recoverable_and_attempted_once() {
        let runner = RecordingRunner::new().fail("systemctl restart", 1, "unit failed");
        let services = ServiceManager::new(&runner, "frr.service");

        let err = services.reload_all(true).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("unit failed"));
        assert_eq!(
            runner
                .calls()
                .iter()
                .filter(|c| c.starts_with("systemctl restart"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_running_config_returns_stdout() {
        let runner = RecordingRunner::new().respond(
            "vtysh",
            ExecResult {
                exit_code: 0,
                stdout: "router openfabric 1\n".to_string(),
                stderr: String::new(),
            },
        );
        let services = ServiceManager::new(&runner, "frr.service");
        assert_eq!(services.running_config().await.unwrap(), "router openfabric 1\n");
        assert_eq!(runner.calls(), vec!["vtysh -c show running-config".to_string()]);
    }

    #[tokio::test]
    async fn test_link_present() {
        let runner = RecordingRunner::new().fail("ip link show eth9", 1, "does not exist");
        let services = ServiceManager::new(&runner, "frr.service");
        assert!(services.link_present("eno1").await.unwrap());
        assert!(!services.link_present("eth9").await.unwrap());
    }
}
