// file: src/mesh/address.rs
// version: 1.0.0
// guid: 3dc8a326-0f46-41e2-98c1-a6de6a412a1e

//! Per-node address plan derivation

use crate::config::{NetworkPlan, VlanRole};
use serde::Serialize;

/// OpenFabric area and system-ID prefix shared by every node
const NET_ID_AREA: &str = "49.0001";
const NET_ID_SYSTEM_PREFIX: &str = "1000.0000";

/// Address of one VLAN sub-interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanAddress {
    pub role: VlanRole,
    pub vlan_id: u16,
    pub interface: String,
    /// Address with prefix length, e.g. 10.55.10.94/24
    pub cidr: String,
    pub fabric: bool,
}

/// Every address owned by one node, derived from its node ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPlan {
    pub node_id: u8,
    pub public_ip: String,
    pub public_gateway: String,
    pub vlans: Vec<VlanAddress>,
    pub net_id: String,
}

impl AddressPlan {
    pub fn vlan(&self, role: VlanRole) -> Option<&VlanAddress> {
        self.vlans.iter().find(|v| v.role == role)
    }

    pub fn cluster_ip(&self) -> Option<&str> {
        self.vlan(VlanRole::Cluster).map(|v| v.cidr.as_str())
    }

    pub fn ceph_ip(&self) -> Option<&str> {
        self.vlan(VlanRole::Ceph).map(|v| v.cidr.as_str())
    }

    pub fn pvecm_ip(&self) -> Option<&str> {
        self.vlan(VlanRole::Pvecm).map(|v| v.cidr.as_str())
    }
}

/// Host address `<prefix>.<node_id>` without prefix length
pub fn host_address(prefix: &str, node_id: u8) -> String {
    format!("{}.{}", prefix, node_id)
}

/// Strip the `/len` suffix from a CIDR string
pub fn strip_prefix_len(cidr: &str) -> &str {
    cidr.split('/').next().unwrap_or(cidr)
}

/// Derive every address of a node. The node ID must already be validated.
pub fn derive_addresses(node_id: u8, plan: &NetworkPlan) -> AddressPlan {
    let vlans = plan
        .vlans
        .iter()
        .map(|vlan| VlanAddress {
            role: vlan.role,
            vlan_id: vlan.id,
            interface: vlan.interface_name(),
            cidr: format!("{}/{}", host_address(&vlan.prefix, node_id), plan.prefix_len),
            fabric: vlan.fabric,
        })
        .collect();

    AddressPlan {
        node_id,
        public_ip: format!(
            "{}/{}",
            host_address(&plan.public_prefix, node_id),
            plan.prefix_len
        ),
        public_gateway: plan.public_gateway.clone(),
        vlans,
        net_id: derive_net_id(node_id),
    }
}

/// OpenFabric NET: `49.0001.1000.0000.00<hh>.00` with the node ID as two
/// lowercase hex digits
pub fn derive_net_id(node_id: u8) -> String {
    format!(
        "{}.{}.00{:02x}.00",
        NET_ID_AREA, NET_ID_SYSTEM_PREFIX, node_id
    )
}
