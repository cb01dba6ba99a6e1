// file: src/mesh/mod.rs
// version: 1.0.0
// guid: 699d745f-caf7-421c-9186-8ef84da5be74

//! Mesh configuration generation: validation, address derivation, rendering
//! and structural inspection.

pub mod address;
pub mod inspect;
pub mod render;
pub mod stanza;
pub mod validator;

pub use address::{derive_addresses, derive_net_id, AddressPlan, VlanAddress};
pub use render::{render_frr_config, render_interfaces_file};

use crate::config::{InterfaceAssignment, MeshConfig, NetworkPlan, NodeIdentity};
use crate::error::Result;
use crate::system::interfaces::InterfaceProbe;
use tracing::info;

/// Rendered output for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    pub addresses: AddressPlan,
    pub interfaces_file: String,
    pub frr_config: String,
}

/// Generates the per-node files for one validated [`MeshConfig`]
pub struct ConfigGenerator {
    config: MeshConfig,
}

impl ConfigGenerator {
    /// Validate raw inputs and build the generator.
    ///
    /// Interface names are always checked for syntax. The existence check is
    /// optional: `generate` renders files for other nodes whose NICs cannot
    /// be seen from here.
    pub fn from_input(
        hostname: &str,
        node_id: &str,
        interfaces: InterfaceAssignment,
        plan: NetworkPlan,
        probe: Option<&dyn InterfaceProbe>,
    ) -> Result<Self> {
        validator::validate_hostname(hostname)?;
        let node_id = validator::validate_node_id(node_id, &plan.node_ids)?;
        validator::validate_interface_names(&interfaces)?;
        if let Some(probe) = probe {
            validator::validate_interfaces(&interfaces, probe)?;
        }

        let identity = NodeIdentity {
            hostname: hostname.to_string(),
            node_id,
        };
        Ok(Self {
            config: MeshConfig::new(identity, interfaces, plan),
        })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn addresses(&self) -> AddressPlan {
        derive_addresses(self.config.identity.node_id, &self.config.plan)
    }

    /// Render both files and check the interfaces text before handing it out
    pub fn generate(&self) -> Result<GeneratedArtifacts> {
        let addresses = self.addresses();
        let interfaces_file = render_interfaces_file(&self.config, &addresses);
        inspect::check_interfaces(&interfaces_file)?;
        let frr_config = render_frr_config(&self.config, &addresses);

        info!(
            "Generated configuration for {} (node {}, NET {})",
            self.config.identity.hostname, self.config.identity.node_id, addresses.net_id
        );
        Ok(GeneratedArtifacts {
            addresses,
            interfaces_file,
            frr_config,
        })
    }
}
