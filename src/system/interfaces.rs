// file: src/system/interfaces.rs
// version: 1.0.0
// guid: b1a15fbd-1115-4057-947e-b99b007aedc2

//! Network interface discovery on the local host

use crate::error::{MeshError, Result};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Name prefixes of virtual devices that never serve as a mesh or uplink NIC
const VIRTUAL_PREFIXES: [&str; 12] = [
    "lo", "vmbr", "vlan", "ovs-system", "tap", "veth", "fwbr", "fwpr", "fwln", "bond", "docker",
    "virbr",
];

/// Source of truth for which interfaces exist
pub trait InterfaceProbe {
    /// All interface names currently present
    fn list(&self) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|n| n == name))
    }
}

/// Probe backed by the running kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl InterfaceProbe for HostProbe {
    fn list(&self) -> Result<Vec<String>> {
        let interfaces = NetworkInterface::show()
            .map_err(|e| MeshError::system(format!("Failed to get network interfaces: {}", e)))?;

        // One entry per address; collapse to unique names
        let names: BTreeSet<String> = interfaces.into_iter().map(|i| i.name).collect();
        Ok(names.into_iter().collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        if !is_valid_interface_name(name) {
            return Ok(false);
        }
        // Links without addresses are missing from getifaddrs on some kernels
        if Path::new("/sys/class/net").join(name).exists() {
            return Ok(true);
        }
        Ok(self.list()?.iter().any(|n| n == name))
    }
}

/// Fixed interface list, for tests and offline rendering
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    names: Vec<String>,
}

impl StaticProbe {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl InterfaceProbe for StaticProbe {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

/// Kernel naming rules for a link: 1-15 bytes, no `/`, `:` or whitespace,
/// and not `.` or `..`
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 15
        && name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace() || c.is_control())
}

/// True for names that look like physical NICs
pub fn is_physical_candidate(name: &str) -> bool {
    !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) && !name.contains('.')
}

/// Physical NIC candidates, sorted by name
pub fn detect_physical_interfaces(probe: &dyn InterfaceProbe) -> Result<Vec<String>> {
    let mut names: Vec<String> = probe
        .list()?
        .into_iter()
        .filter(|n| is_physical_candidate(n))
        .collect();
    names.sort();
    names.dedup();
    debug!("Detected physical interfaces: {:?}", names);
    Ok(names)
}
