// file: src/deploy/mod.rs
// version: 1.0.0
// guid: 2559f8d7-486c-46c0-a3d8-fcaaac726f3f

//! Deployment of generated configuration onto a node
//!
//! This module handles:
//! - Backing up every file that is about to change
//! - Atomic replacement of the interfaces file and frr.conf
//! - The fabricd flag in the FRR daemons file and the /etc/hosts block
//! - A single reload attempt of the live system
//! - Rollback to the latest backups and inspection of installed files

use crate::config::{MeshConfig, NetworkPlan, SystemPaths};
use crate::error::{MeshError, Result};
use crate::mesh::inspect::{self, InterfacesSummary};
use crate::mesh::render::{enable_fabricd, merge_hosts, render_hosts_block};
use crate::mesh::GeneratedArtifacts;
use crate::system::{
    atomic_write, BackupRecord, BackupRun, BackupStore, CommandRunner, ConfigLock, ServiceManager,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What a deployment should touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    pub write_frr: bool,
    pub write_hosts: bool,
    pub reload: bool,
    pub set_hostname: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            write_frr: true,
            write_hosts: true,
            reload: true,
            set_hostname: false,
        }
    }
}

/// Outcome of the write phase
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployReport {
    pub run_id: String,
    pub backups: Vec<BackupRecord>,
    /// Files that did not exist before this run
    pub created: Vec<PathBuf>,
    pub written: Vec<PathBuf>,
    pub daemons_changed: bool,
    pub hosts_changed: bool,
}

/// Result of inspecting the files installed on a node
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub interfaces: Option<InterfacesSummary>,
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

/// A file write prepared in memory before anything is touched
struct PendingWrite {
    path: PathBuf,
    content: String,
}

pub struct MeshDeployer<'a> {
    paths: SystemPaths,
    runner: &'a dyn CommandRunner,
}

impl<'a> MeshDeployer<'a> {
    pub fn new(paths: SystemPaths, runner: &'a dyn CommandRunner) -> Self {
        Self { paths, runner }
    }

    pub fn paths(&self) -> &SystemPaths {
        &self.paths
    }

    fn backups(&self) -> BackupStore {
        BackupStore::new(&self.paths.backup_dir)
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Work out every write up front so a read failure aborts before any change
    fn plan_writes(
        &self,
        config: &MeshConfig,
        artifacts: &GeneratedArtifacts,
        options: &DeployOptions,
    ) -> Result<(Vec<PendingWrite>, bool, bool)> {
        let mut writes = vec![PendingWrite {
            path: self.paths.interfaces.clone(),
            content: artifacts.interfaces_file.clone(),
        }];
        let mut daemons_changed = false;
        let mut hosts_changed = false;

        if options.write_frr {
            writes.push(PendingWrite {
                path: self.paths.frr_conf.clone(),
                content: artifacts.frr_config.clone(),
            });

            let daemons = Self::read_optional(&self.paths.frr_daemons)?.unwrap_or_default();
            let (content, changed) = enable_fabricd(&daemons);
            if changed {
                writes.push(PendingWrite {
                    path: self.paths.frr_daemons.clone(),
                    content,
                });
                daemons_changed = true;
            }
        }

        if options.write_hosts {
            if let Some(block) = render_hosts_block(&config.plan) {
                let existing = Self::read_optional(&self.paths.hosts)?.unwrap_or_default();
                if let Some(content) = merge_hosts(&existing, &block) {
                    writes.push(PendingWrite {
                        path: self.paths.hosts.clone(),
                        content,
                    });
                    hosts_changed = true;
                }
            }
        }

        Ok((writes, daemons_changed, hosts_changed))
    }

    /// Back up and replace the managed files under the run lock. Either every
    /// file is replaced and the run is recorded, or the files already
    /// replaced are put back and the error is returned.
    pub fn write(
        &self,
        config: &MeshConfig,
        artifacts: &GeneratedArtifacts,
        options: &DeployOptions,
    ) -> Result<DeployReport> {
        inspect::check_interfaces(&artifacts.interfaces_file)?;
        let (writes, daemons_changed, hosts_changed) = self.plan_writes(config, artifacts, options)?;

        let _lock = ConfigLock::acquire(&self.paths.lock_file)?;
        let store = self.backups();

        let sources: Vec<&Path> = writes.iter().map(|w| w.path.as_path()).collect();
        let mut run = store.begin_run(&sources)?;
        for write in &writes {
            store.backup(&mut run, &write.path)?;
        }

        let mut written = Vec::new();
        for write in &writes {
            if let Err(e) = atomic_write(&write.path, &write.content) {
                error!("Writing {} failed: {}", write.path.display(), e);
                Self::undo(&store, &run, &written);
                return Err(e);
            }
            info!("Wrote {}", write.path.display());
            written.push(write.path.clone());
        }

        if let Err(e) = store.commit(&run) {
            error!("Recording run {} failed: {}", run.id, e);
            Self::undo(&store, &run, &written);
            return Err(e);
        }

        Ok(DeployReport {
            run_id: run.id,
            backups: run.backups,
            created: run.created,
            written,
            daemons_changed,
            hosts_changed,
        })
    }

    /// Put back the files of an unfinished run that were already replaced
    fn undo(store: &BackupStore, run: &BackupRun, written: &[PathBuf]) {
        let partial = BackupRun {
            id: run.id.clone(),
            backups: run
                .backups
                .iter()
                .filter(|r| written.contains(&r.source))
                .cloned()
                .collect(),
            created: run
                .created
                .iter()
                .filter(|p| written.contains(p))
                .cloned()
                .collect(),
        };
        match store.restore(&partial) {
            Ok(()) => warn!("Reverted {} file(s) written by run {}", written.len(), run.id),
            Err(e) => error!("Could not revert run {}: {}", run.id, e),
        }
    }

    /// Write the configuration, then make one attempt at reloading it.
    ///
    /// A reload failure comes back as [`MeshError::ApplyFailed`]; the files
    /// stay in place and `reload` can be retried on its own.
    pub async fn deploy(
        &self,
        config: &MeshConfig,
        artifacts: &GeneratedArtifacts,
        options: &DeployOptions,
    ) -> Result<DeployReport> {
        let report = self.write(config, artifacts, options)?;

        if options.set_hostname {
            ServiceManager::new(self.runner, &config.plan.frr_service)
                .set_hostname(&config.identity.hostname)
                .await?;
        }

        if options.reload {
            self.reload(&config.plan, options.write_frr).await?;
        } else {
            info!("Skipping live reload; run `pve-mesh reload` to activate");
        }
        Ok(report)
    }

    /// Reload network and routing daemon once
    pub async fn reload(&self, plan: &NetworkPlan, with_frr: bool) -> Result<()> {
        let services = ServiceManager::new(self.runner, &plan.frr_service);
        services.reload_all(with_frr).await.map_err(|e| {
            error!("Configuration is persisted but the live reload failed: {}", e);
            warn!("Fix the cause and retry with `pve-mesh reload`");
            e
        })
    }

    /// The run a rollback would undo
    pub fn rollback_candidates(&self) -> Result<Option<BackupRun>> {
        self.backups().latest_run()
    }

    /// Undo the most recent apply: restore the files it replaced and remove
    /// the ones it created. Repeated rollbacks walk back one run at a time.
    pub fn rollback(&self) -> Result<BackupRun> {
        let _lock = ConfigLock::acquire(&self.paths.lock_file)?;
        let store = self.backups();
        let run = store.latest_run()?.ok_or_else(|| {
            MeshError::config(format!(
                "No backups found in {}",
                self.paths.backup_dir.display()
            ))
        })?;

        store.restore(&run)?;
        store.retire(&run)?;
        info!("Rolled back run {}", run.id);
        Ok(run)
    }

    /// Inspect installed files against a plan. `expected_net` narrows the
    /// frr.conf check to one node.
    pub fn check(&self, plan: &NetworkPlan, expected_net: Option<&str>) -> Result<CheckReport> {
        let mut report = CheckReport::default();

        match Self::read_optional(&self.paths.interfaces)? {
            None => report
                .problems
                .push(format!("{} does not exist", self.paths.interfaces.display())),
            Some(content) => match inspect::check_interfaces(&content) {
                Ok(summary) => {
                    if !summary.has_bridge(&plan.mesh_bridge) {
                        report
                            .problems
                            .push(format!("mesh bridge {} is not defined", plan.mesh_bridge));
                    }
                    for vlan in &plan.vlans {
                        if !summary.vlan_tags.contains_key(&vlan.id) {
                            report
                                .problems
                                .push(format!("no interface carries VLAN {} ({})", vlan.id, vlan.role));
                        }
                    }
                    report.interfaces = Some(summary);
                }
                Err(e) => report.problems.push(e.to_string()),
            },
        }

        match Self::read_optional(&self.paths.frr_conf)? {
            None => report
                .problems
                .push(format!("{} does not exist", self.paths.frr_conf.display())),
            Some(content) => report
                .problems
                .extend(inspect::frr_problems(&content, expected_net)),
        }

        let daemons = Self::read_optional(&self.paths.frr_daemons)?.unwrap_or_default();
        if !inspect::fabricd_enabled(&daemons) {
            report.problems.push("fabricd is not enabled in the FRR daemons file".to_string());
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterfaceAssignment, NetworkPlan};
    use crate::mesh::ConfigGenerator;
    use crate::system::RecordingRunner;
    use tempfile::TempDir;

    fn artifacts() -> (MeshConfig, GeneratedArtifacts) {
        let generator = ConfigGenerator::from_input(
            "pve4",
            "94",
            InterfaceAssignment::new("eno1", "ens1f0", "ens1f1"),
            NetworkPlan::mesh(),
            None,
        )
        .unwrap();
        let artifacts = generator.generate().unwrap();
        (generator.config().clone(), artifacts)
    }

    fn seeded_root() -> (TempDir, SystemPaths) {
        let root = TempDir::new().unwrap();
        let paths = SystemPaths::rooted(root.path());
        fs::create_dir_all(paths.interfaces.parent().unwrap()).unwrap();
        fs::create_dir_all(paths.frr_conf.parent().unwrap()).unwrap();
        fs::write(&paths.interfaces, "auto lo\niface lo inet loopback\n").unwrap();
        fs::write(&paths.frr_daemons, "zebra=yes\nfabricd=no\n").unwrap();
        fs::write(&paths.hosts, "127.0.0.1 localhost\n").unwrap();
        (root, paths)
    }

    #[test]
    fn test_write_backs_up_and_replaces() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();

        let report = deployer
            .write(&config, &artifacts, &DeployOptions::default())
            .unwrap();

        assert_eq!(fs::read_to_string(&paths.interfaces).unwrap(), artifacts.interfaces_file);
        assert_eq!(fs::read_to_string(&paths.frr_conf).unwrap(), artifacts.frr_config);
        assert_eq!(
            fs::read_to_string(&paths.frr_daemons).unwrap(),
            "zebra=yes\nfabricd=yes\n"
        );
        assert!(fs::read_to_string(&paths.hosts)
            .unwrap()
            .contains("10.55.10.94 pve4\n"));
        assert!(report.daemons_changed);
        assert!(report.hosts_changed);
        // frr.conf did not exist before, so three backups
        assert_eq!(report.backups.len(), 3);
        assert_eq!(report.written.len(), 4);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_write_respects_no_frr_and_no_hosts() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();
        let options = DeployOptions {
            write_frr: false,
            write_hosts: false,
            ..Default::default()
        };

        let report = deployer.write(&config, &artifacts, &options).unwrap();
        assert_eq!(report.written, vec![paths.interfaces.clone()]);
        assert!(!paths.frr_conf.exists());
        assert_eq!(fs::read_to_string(&paths.frr_daemons).unwrap(), "zebra=yes\nfabricd=no\n");
    }

    #[test]
    fn test_rendered_duplicate_vlan_aborts_before_write() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, mut artifacts) = artifacts();
        artifacts.interfaces_file = artifacts.interfaces_file.replace("tag=60", "tag=55");

        let err = deployer
            .write(&config, &artifacts, &DeployOptions::default())
            .unwrap_err();
        assert!(matches!(err, MeshError::DuplicateVlanTag { tag: 55, .. }));
        assert_eq!(
            fs::read_to_string(&paths.interfaces).unwrap(),
            "auto lo\niface lo inet loopback\n"
        );
        assert!(!paths.backup_dir.exists());
    }

    #[test]
    fn test_second_run_is_idempotent_for_flags() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();

        deployer.write(&config, &artifacts, &DeployOptions::default()).unwrap();
        let hosts_after_first = fs::read_to_string(&paths.hosts).unwrap();
        let second = deployer.write(&config, &artifacts, &DeployOptions::default()).unwrap();

        assert!(!second.daemons_changed);
        assert!(!second.hosts_changed);
        assert_eq!(fs::read_to_string(&paths.hosts).unwrap(), hosts_after_first);
    }

    #[tokio::test]
    async fn test_deploy_reload_failure_keeps_files() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new().fail("ifreload", 1, "syntax error");
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();

        let err = deployer
            .deploy(&config, &artifacts, &DeployOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_recoverable());
        assert_eq!(fs::read_to_string(&paths.interfaces).unwrap(), artifacts.interfaces_file);
    }

    #[tokio::test]
    async fn test_deploy_sets_hostname_when_asked() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths, &runner);
        let (config, artifacts) = artifacts();
        let options = DeployOptions {
            set_hostname: true,
            reload: false,
            ..Default::default()
        };

        deployer.deploy(&config, &artifacts, &options).await.unwrap();
        assert_eq!(runner.calls(), vec!["hostnamectl set-hostname pve4".to_string()]);
    }

    #[test]
    fn test_rollback_restores_previous_content() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();

        let report = deployer.write(&config, &artifacts, &DeployOptions::default()).unwrap();
        let run = deployer.rollback().unwrap();

        assert_eq!(run.id, report.run_id);
        assert_eq!(run.backups.len(), 3);
        assert_eq!(run.created, vec![paths.frr_conf.clone()]);
        assert_eq!(
            fs::read_to_string(&paths.interfaces).unwrap(),
            "auto lo\niface lo inet loopback\n"
        );
        assert_eq!(fs::read_to_string(&paths.frr_daemons).unwrap(), "zebra=yes\nfabricd=no\n");
        assert_eq!(fs::read_to_string(&paths.hosts).unwrap(), "127.0.0.1 localhost\n");
        assert!(!paths.frr_conf.exists());
        assert!(deployer.rollback_candidates().unwrap().is_none());
    }

    #[test]
    fn test_rollback_undoes_only_the_latest_run() {
        // Arrange
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config94, artifacts94) = artifacts();
        let generator93 = ConfigGenerator::from_input(
            "pve3",
            "93",
            InterfaceAssignment::new("eno1", "ens1f0", "ens1f1"),
            NetworkPlan::mesh(),
            None,
        )
        .unwrap();
        let artifacts93 = generator93.generate().unwrap();

        deployer.write(&config94, &artifacts94, &DeployOptions::default()).unwrap();
        let daemons_after_first = fs::read_to_string(&paths.frr_daemons).unwrap();
        let hosts_after_first = fs::read_to_string(&paths.hosts).unwrap();
        let second = deployer
            .write(generator93.config(), &artifacts93, &DeployOptions::default())
            .unwrap();
        assert_eq!(second.written.len(), 2);

        // Act
        let undone = deployer.rollback().unwrap();

        // Assert
        assert_eq!(undone.id, second.run_id);
        assert_eq!(fs::read_to_string(&paths.interfaces).unwrap(), artifacts94.interfaces_file);
        assert_eq!(fs::read_to_string(&paths.frr_conf).unwrap(), artifacts94.frr_config);
        assert_eq!(fs::read_to_string(&paths.frr_daemons).unwrap(), daemons_after_first);
        assert_eq!(fs::read_to_string(&paths.hosts).unwrap(), hosts_after_first);

        // A second rollback goes back to the state before the first apply
        deployer.rollback().unwrap();
        assert_eq!(
            fs::read_to_string(&paths.interfaces).unwrap(),
            "auto lo\niface lo inet loopback\n"
        );
        assert!(!paths.frr_conf.exists());
        assert!(deployer.rollback().is_err());
    }

    #[test]
    fn test_failed_write_reverts_files_already_replaced() {
        // Arrange
        let (root, mut paths) = seeded_root();
        fs::write(root.path().join("blocker"), "not a directory\n").unwrap();
        paths.frr_conf = root.path().join("blocker/frr.conf");
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths.clone(), &runner);
        let (config, artifacts) = artifacts();

        // Act
        let result = deployer.write(&config, &artifacts, &DeployOptions::default());

        // Assert
        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(&paths.interfaces).unwrap(),
            "auto lo\niface lo inet loopback\n"
        );
        assert_eq!(fs::read_to_string(&paths.frr_daemons).unwrap(), "zebra=yes\nfabricd=no\n");
        assert_eq!(fs::read_to_string(&paths.hosts).unwrap(), "127.0.0.1 localhost\n");
        assert!(deployer.rollback_candidates().unwrap().is_none());
    }

    #[test]
    fn test_rollback_without_backups_fails() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths, &runner);
        assert!(deployer.rollback().is_err());
    }

    #[test]
    fn test_check_after_write_is_healthy() {
        let (_root, paths) = seeded_root();
        let runner = RecordingRunner::new();
        let deployer = MeshDeployer::new(paths, &runner);
        let (config, artifacts) = artifacts();

        let before = deployer.check(&config.plan, None).unwrap();
        assert!(!before.is_healthy());

        deployer.write(&config, &artifacts, &DeployOptions::default()).unwrap();
        let after = deployer
            .check(&config.plan, Some("49.0001.1000.0000.005e.00"))
            .unwrap();
        assert!(after.is_healthy(), "problems: {:?}", after.problems);
        assert!(after.interfaces.unwrap().has_bridge("vmbr1"));
    }
}
