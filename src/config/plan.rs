// file: src/config/plan.rs
// version: 1.0.0
// guid: 5af4f437-d9f0-4b6d-ae82-1aa9fb2e1af2

//! Network plan profiles
//!
//! A plan fixes everything that is shared by all nodes of a cluster: subnet
//! prefixes, VLAN numbering, MTUs, bridge names and which node IDs are
//! acceptable. The canonical VLAN mapping is 50 = pvecm (corosync),
//! 55 = cluster, 60 = ceph.

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use validator::Validate;

/// Profile used when none is requested
pub const DEFAULT_PROFILE: &str = "mesh";

/// Names of the built-in profiles
pub const BUILTIN_PROFILES: [&str; 3] = ["mesh", "mesh-jumbo", "generic"];

/// Traffic class carried by a VLAN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlanRole {
    Pvecm,
    Cluster,
    Ceph,
}

impl VlanRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            VlanRole::Pvecm => "pvecm",
            VlanRole::Cluster => "cluster",
            VlanRole::Ceph => "ceph",
        }
    }
}

impl fmt::Display for VlanRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tagged sub-interface on the mesh bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VlanSpec {
    pub role: VlanRole,
    /// 802.1Q tag
    #[validate(range(min = 1, max = 4094))]
    pub id: u16,
    /// First three octets of the subnet, e.g. "10.55.10"
    #[validate(length(min = 5, max = 11))]
    pub prefix: String,
    /// Whether OpenFabric runs on this VLAN
    #[serde(default = "default_true")]
    pub fabric: bool,
}

impl VlanSpec {
    fn new(role: VlanRole, id: u16, prefix: &str, fabric: bool) -> Self {
        Self {
            role,
            id,
            prefix: prefix.to_string(),
            fabric,
        }
    }

    /// Name of the OVS internal port carrying this VLAN
    pub fn interface_name(&self) -> String {
        format!("vlan{}", self.id)
    }
}

fn default_true() -> bool {
    true
}

/// Which node IDs a plan accepts. Exactly one policy applies per plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeIdPolicy {
    /// Any ID in the inclusive range
    Range { min: u8, max: u8 },
    /// Only the listed IDs, for fixed-size deployments
    Whitelist { ids: Vec<u8> },
}

impl NodeIdPolicy {
    pub fn allows(&self, id: u8) -> bool {
        match self {
            NodeIdPolicy::Range { min, max } => (*min..=*max).contains(&id),
            NodeIdPolicy::Whitelist { ids } => ids.contains(&id),
        }
    }

    /// Enumerable IDs, used by `generate --all`
    pub fn ids(&self) -> Vec<u8> {
        match self {
            NodeIdPolicy::Range { min, max } => (*min..=*max).collect(),
            NodeIdPolicy::Whitelist { ids } => ids.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NodeIdPolicy::Range { min, max } => min > max,
            NodeIdPolicy::Whitelist { ids } => ids.is_empty(),
        }
    }
}

impl fmt::Display for NodeIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIdPolicy::Range { min, max } => write!(f, "{}-{}", min, max),
            NodeIdPolicy::Whitelist { ids } => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "one of {{{}}}", ids.join(","))
            }
        }
    }
}

/// A cluster member listed in the /etc/hosts block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHost {
    pub node_id: u8,
    pub hostname: String,
}

/// Rapid spanning tree settings for the mesh bridge and its ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RstpSettings {
    pub priority: u32,
    pub forward_delay: u8,
    pub max_age: u8,
    pub path_cost: u32,
}

impl Default for RstpSettings {
    fn default() -> Self {
        Self {
            priority: 32768,
            forward_delay: 4,
            max_age: 6,
            path_cost: 150,
        }
    }
}

/// Cluster-wide address plan and layout parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NetworkPlan {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// First three octets of the public subnet
    pub public_prefix: String,
    pub public_gateway: String,
    #[serde(default = "default_public_bridge")]
    pub public_bridge: String,
    #[validate(range(min = 576, max = 9216))]
    pub public_mtu: u16,
    pub mesh_bridge: String,
    #[validate(range(min = 576, max = 9216))]
    pub mesh_mtu: u16,
    #[validate(range(min = 8, max = 30))]
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,
    #[validate(length(min = 1), nested)]
    pub vlans: Vec<VlanSpec>,
    pub node_ids: NodeIdPolicy,
    #[serde(default)]
    pub hosts: Vec<ClusterHost>,
    #[serde(default)]
    pub rstp: RstpSettings,
    #[serde(default = "default_frr_service")]
    pub frr_service: String,
}

fn default_public_bridge() -> String {
    "vmbr0".to_string()
}

fn default_prefix_len() -> u8 {
    24
}

fn default_frr_service() -> String {
    "frr.service".to_string()
}

impl NetworkPlan {
    /// Five-node full mesh with pvecm, cluster and ceph VLANs on vmbr1
    pub fn mesh() -> Self {
        Self {
            name: "mesh".to_string(),
            public_prefix: "192.168.51".to_string(),
            public_gateway: "192.168.51.1".to_string(),
            public_bridge: default_public_bridge(),
            public_mtu: 1500,
            mesh_bridge: "vmbr1".to_string(),
            mesh_mtu: 9000,
            prefix_len: 24,
            vlans: vec![
                VlanSpec::new(VlanRole::Pvecm, 50, "10.50.10", false),
                VlanSpec::new(VlanRole::Cluster, 55, "10.55.10", true),
                VlanSpec::new(VlanRole::Ceph, 60, "10.60.10", true),
            ],
            node_ids: NodeIdPolicy::Whitelist {
                ids: vec![90, 91, 92, 93, 94],
            },
            hosts: (90u8..=94)
                .map(|id| ClusterHost {
                    node_id: id,
                    hostname: format!("pve{}", id - 90),
                })
                .collect(),
            rstp: RstpSettings::default(),
            frr_service: default_frr_service(),
        }
    }

    /// Same as [`NetworkPlan::mesh`] with jumbo frames on the public bridge
    pub fn mesh_jumbo() -> Self {
        Self {
            name: "mesh-jumbo".to_string(),
            public_mtu: 9000,
            ..Self::mesh()
        }
    }

    /// Any node ID, cluster and ceph VLANs only, mesh bridge vmbr2
    pub fn generic() -> Self {
        Self {
            name: "generic".to_string(),
            public_prefix: "192.168.51".to_string(),
            public_gateway: "192.168.51.1".to_string(),
            public_bridge: default_public_bridge(),
            public_mtu: 1500,
            mesh_bridge: "vmbr2".to_string(),
            mesh_mtu: 9000,
            prefix_len: 24,
            vlans: vec![
                VlanSpec::new(VlanRole::Cluster, 55, "10.55.10", true),
                VlanSpec::new(VlanRole::Ceph, 60, "10.60.10", true),
            ],
            node_ids: NodeIdPolicy::Range { min: 1, max: 254 },
            hosts: Vec::new(),
            rstp: RstpSettings::default(),
            frr_service: default_frr_service(),
        }
    }

    /// Look up a built-in profile by name
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "mesh" => Ok(Self::mesh()),
            "mesh-jumbo" => Ok(Self::mesh_jumbo()),
            "generic" => Ok(Self::generic()),
            other => Err(MeshError::config(format!(
                "Unknown profile '{}' (available: {})",
                other,
                BUILTIN_PROFILES.join(", ")
            ))),
        }
    }

    pub fn vlan(&self, role: VlanRole) -> Option<&VlanSpec> {
        self.vlans.iter().find(|v| v.role == role)
    }

    /// VLANs that carry OpenFabric adjacencies
    pub fn fabric_vlans(&self) -> impl Iterator<Item = &VlanSpec> {
        self.vlans.iter().filter(|v| v.fabric)
    }

    /// The cluster VLAN. Present in every validated plan.
    pub fn cluster_vlan(&self) -> Result<&VlanSpec> {
        self.vlan(VlanRole::Cluster)
            .ok_or_else(|| MeshError::config(format!("Plan '{}' has no cluster VLAN", self.name)))
    }

    /// Validate field ranges and cross-field consistency
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)
            .map_err(|e| MeshError::config(format!("Plan '{}': {}", self.name, e)))?;

        for (label, prefix) in std::iter::once(("public_prefix", &self.public_prefix))
            .chain(self.vlans.iter().map(|v| ("vlan prefix", &v.prefix)))
        {
            if !is_three_octets(prefix) {
                return Err(MeshError::config(format!(
                    "Plan '{}': {} '{}' must be three octets like 10.55.10",
                    self.name, label, prefix
                )));
            }
        }

        crate::mesh::validator::validate_ip(&self.public_gateway)?;

        let mut seen_ids = HashSet::new();
        let mut seen_roles = HashSet::new();
        for vlan in &self.vlans {
            if !seen_ids.insert(vlan.id) {
                return Err(MeshError::config(format!(
                    "Plan '{}': VLAN {} is listed twice",
                    self.name, vlan.id
                )));
            }
            if !seen_roles.insert(vlan.role) {
                return Err(MeshError::config(format!(
                    "Plan '{}': more than one {} VLAN",
                    self.name, vlan.role
                )));
            }
        }
        self.cluster_vlan()?;

        if self.public_bridge == self.mesh_bridge {
            return Err(MeshError::config(format!(
                "Plan '{}': public and mesh bridge are both {}",
                self.name, self.mesh_bridge
            )));
        }

        if self.node_ids.is_empty() {
            return Err(MeshError::config(format!(
                "Plan '{}': node ID policy accepts nothing",
                self.name
            )));
        }
        if self.node_ids.ids().contains(&0) {
            return Err(MeshError::config(format!(
                "Plan '{}': node ID 0 is a network address",
                self.name
            )));
        }

        for host in &self.hosts {
            crate::mesh::validator::validate_hostname(&host.hostname)?;
            if !self.node_ids.allows(host.node_id) {
                return Err(MeshError::config(format!(
                    "Plan '{}': host {} uses node ID {} outside {}",
                    self.name, host.hostname, host.node_id, self.node_ids
                )));
            }
        }

        Ok(())
    }
}

impl Default for NetworkPlan {
    fn default() -> Self {
        Self::mesh()
    }
}

fn is_three_octets(prefix: &str) -> bool {
    let parts: Vec<&str> = prefix.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.parse::<u8>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_validate() {
        for name in BUILTIN_PROFILES {
            let plan = NetworkPlan::builtin(name).unwrap();
            assert!(plan.validate().is_ok(), "profile {} should validate", name);
        }
    }

    #[test]
    fn test_unknown_profile() {
        let err = NetworkPlan::builtin("ring").unwrap_err();
        assert!(err.to_string().contains("Unknown profile 'ring'"));
    }

    #[test]
    fn test_mesh_profile_layout() {
        let plan = NetworkPlan::mesh();
        assert_eq!(plan.mesh_bridge, "vmbr1");
        assert_eq!(plan.public_mtu, 1500);
        assert_eq!(plan.vlan(VlanRole::Pvecm).unwrap().id, 50);
        assert_eq!(plan.vlan(VlanRole::Cluster).unwrap().id, 55);
        assert_eq!(plan.vlan(VlanRole::Ceph).unwrap().id, 60);
        let fabric: Vec<u16> = plan.fabric_vlans().map(|v| v.id).collect();
        assert_eq!(fabric, vec![55, 60]);
        assert_eq!(plan.hosts.len(), 5);
        assert_eq!(plan.hosts[4].hostname, "pve4");
    }

    #[test]
    fn test_generic_profile_layout() {
        let plan = NetworkPlan::generic();
        assert_eq!(plan.mesh_bridge, "vmbr2");
        assert!(plan.vlan(VlanRole::Pvecm).is_none());
        assert!(plan.node_ids.allows(1));
        assert!(plan.node_ids.allows(254));
        assert!(!plan.node_ids.allows(255));
    }

    #[test]
    fn test_jumbo_profile_only_changes_public_mtu() {
        let jumbo = NetworkPlan::mesh_jumbo();
        let mesh = NetworkPlan::mesh();
        assert_eq!(jumbo.public_mtu, 9000);
        assert_eq!(jumbo.vlans, mesh.vlans);
        assert_eq!(jumbo.mesh_bridge, mesh.mesh_bridge);
    }

    #[test]
    fn test_whitelist_policy() {
        let policy = NodeIdPolicy::Whitelist { ids: vec![90, 91] };
        assert!(policy.allows(90));
        assert!(!policy.allows(92));
        assert_eq!(policy.to_string(), "one of {90,91}");
    }

    #[test]
    fn test_duplicate_vlan_id_rejected() {
        let mut plan = NetworkPlan::mesh();
        plan.vlans[2].id = 55;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_missing_cluster_vlan_rejected() {
        let mut plan = NetworkPlan::mesh();
        plan.vlans.retain(|v| v.role != VlanRole::Cluster);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("no cluster VLAN"));
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let mut plan = NetworkPlan::mesh();
        plan.public_prefix = "192.168.51.0".to_string();
        assert!(plan.validate().is_err());

        let mut plan = NetworkPlan::mesh();
        plan.vlans[0].prefix = "10.300.1".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_out_of_range_vlan_rejected() {
        let mut plan = NetworkPlan::generic();
        plan.vlans[0].id = 4095;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_host_outside_policy_rejected() {
        let mut plan = NetworkPlan::mesh();
        plan.hosts.push(ClusterHost {
            node_id: 12,
            hostname: "stray".to_string(),
        });
        assert!(plan.validate().is_err());
    }
}
