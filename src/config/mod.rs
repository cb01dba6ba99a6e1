// file: src/config/mod.rs
// version: 1.0.0
// guid: bdfa6beb-244a-4d81-bfdf-893c1368eda8

//! Configuration module for the mesh network tool
//!
//! Holds the per-invocation node configuration, the network plan profiles and
//! the destination paths of every file the tool manages.

pub mod loader;
pub mod plan;

pub use plan::{ClusterHost, NetworkPlan, NodeIdPolicy, RstpSettings, VlanRole, VlanSpec};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of the node being configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Short hostname (e.g. pve4)
    pub hostname: String,
    /// Last octet of every address owned by this node
    pub node_id: u8,
}

/// Physical NICs used by the generated configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAssignment {
    /// NIC enslaved to the public bridge
    pub public: String,
    /// First mesh link
    pub cluster: String,
    /// Second mesh link
    pub ceph: String,
}

impl InterfaceAssignment {
    pub fn new(
        public: impl Into<String>,
        cluster: impl Into<String>,
        ceph: impl Into<String>,
    ) -> Self {
        Self {
            public: public.into(),
            cluster: cluster.into(),
            ceph: ceph.into(),
        }
    }

    /// NICs attached to the mesh bridge, in order and without repeats
    pub fn mesh_ports(&self) -> Vec<&str> {
        let mut ports = vec![self.cluster.as_str()];
        if self.ceph != self.cluster {
            ports.push(self.ceph.as_str());
        }
        ports
    }

    /// All assigned NICs, for existence checks
    pub fn all(&self) -> [&str; 3] {
        [&self.public, &self.cluster, &self.ceph]
    }
}

/// Everything one run of the generator needs, built once and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    pub identity: NodeIdentity,
    pub interfaces: InterfaceAssignment,
    pub plan: NetworkPlan,
}

impl MeshConfig {
    pub fn new(identity: NodeIdentity, interfaces: InterfaceAssignment, plan: NetworkPlan) -> Self {
        Self {
            identity,
            interfaces,
            plan,
        }
    }
}

/// Locations of the files managed on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
    pub interfaces: PathBuf,
    pub frr_conf: PathBuf,
    pub frr_daemons: PathBuf,
    pub hosts: PathBuf,
    pub backup_dir: PathBuf,
    pub lock_file: PathBuf,
    pub log_dir: PathBuf,
}

impl SystemPaths {
    /// Paths relative to an alternate root, e.g. a staging tree
    pub fn rooted<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            interfaces: root.join("etc/network/interfaces"),
            frr_conf: root.join("etc/frr/frr.conf"),
            frr_daemons: root.join("etc/frr/daemons"),
            hosts: root.join("etc/hosts"),
            backup_dir: root.join("var/backups/pve-mesh"),
            lock_file: root.join("run/lock/pve-mesh.lock"),
            log_dir: root.join("var/log/pve-mesh"),
        }
    }

    /// Per-node output names used by `generate`
    pub fn per_node<P: AsRef<Path>>(dir: P, node_id: u8) -> (PathBuf, PathBuf) {
        let dir = dir.as_ref();
        (
            dir.join(format!("interfaces.{}", node_id)),
            dir.join(format!("frr.conf.{}", node_id)),
        )
    }
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self::rooted("/")
    }
}
