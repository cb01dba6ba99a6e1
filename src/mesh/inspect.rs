// file: src/mesh/inspect.rs
// version: 1.0.0
// guid: 8ded603b-e7ee-4150-abc3-e644b889ecbe

//! Structural checks on interfaces and frr.conf content
//!
//! Run against freshly rendered text before it replaces anything on disk, and
//! by `check` against whatever is currently installed.

use super::stanza::{parse_interfaces, Stanza};
use crate::error::{MeshError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// What an interfaces file declares
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterfacesSummary {
    pub bridges: Vec<String>,
    /// VLAN tag to interfaces carrying it
    pub vlan_tags: BTreeMap<u16, Vec<String>>,
    pub stanza_count: usize,
}

impl InterfacesSummary {
    pub fn has_bridge(&self, name: &str) -> bool {
        self.bridges.iter().any(|b| b == name)
    }
}

/// Summarize stanzas without judging them
pub fn summarize(stanzas: &[Stanza]) -> InterfacesSummary {
    let mut summary = InterfacesSummary {
        stanza_count: stanzas.len(),
        ..Default::default()
    };

    for stanza in stanzas {
        if stanza.is_bridge() {
            summary.bridges.push(stanza.name.clone());
        }
        if let Some(tag) = stanza.vlan_tag() {
            summary
                .vlan_tags
                .entry(tag)
                .or_default()
                .push(stanza.name.clone());
        }
    }
    summary
}

/// Reject duplicate bridge definitions and VLAN tags used by more than one
/// interface.
pub fn check_interfaces(content: &str) -> Result<InterfacesSummary> {
    let stanzas = parse_interfaces(content);
    let summary = summarize(&stanzas);
    debug!(
        "Parsed {} stanzas, {} bridges, {} VLAN tags",
        summary.stanza_count,
        summary.bridges.len(),
        summary.vlan_tags.len()
    );

    let mut seen: Vec<&str> = Vec::new();
    for bridge in &summary.bridges {
        if seen.contains(&bridge.as_str()) {
            return Err(MeshError::DuplicateBridge(bridge.clone()));
        }
        seen.push(bridge);
    }

    // The same name may appear once per address family
    let mut defined: Vec<(&str, &str)> = Vec::new();
    for stanza in &stanzas {
        let key = (stanza.name.as_str(), stanza.family.as_str());
        if defined.contains(&key) {
            return Err(MeshError::DuplicateInterface(stanza.name.clone()));
        }
        defined.push(key);
    }

    for (tag, interfaces) in &summary.vlan_tags {
        if interfaces.len() > 1 {
            return Err(MeshError::DuplicateVlanTag {
                tag: *tag,
                interfaces: interfaces.clone(),
            });
        }
    }

    Ok(summary)
}

/// Problems found in an frr.conf; empty when it looks like a mesh config
pub fn frr_problems(content: &str, expected_net: Option<&str>) -> Vec<String> {
    let mut problems = Vec::new();
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    if !lines.iter().any(|l| l.starts_with("router openfabric ")) {
        problems.push("no 'router openfabric' section".to_string());
    }

    let nets: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("net "))
        .collect();
    match (nets.as_slice(), expected_net) {
        ([], _) => problems.push("no OpenFabric NET configured".to_string()),
        ([net], Some(expected)) if *net != expected => {
            problems.push(format!("NET is {} but {} was expected", net, expected))
        }
        ([_], _) => {}
        (many, _) => problems.push(format!("{} NET lines configured", many.len())),
    }

    if !lines.iter().any(|l| *l == "ip forwarding") {
        problems.push("IPv4 forwarding is not enabled".to_string());
    }
    problems
}

/// Whether the daemons file enables fabricd
pub fn fabricd_enabled(daemons: &str) -> bool {
    daemons.lines().any(|l| l.trim() == "fabricd=yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_VLAN55: &str = "\
auto vmbr1
iface vmbr1 inet manual
\tovs_type OVSBridge
\tovs_ports ens1f0 vlan55 cluster2

auto vlan55
iface vlan55 inet static
\tovs_type OVSIntPort
\tovs_bridge vmbr1
\tovs_options tag=55

auto cluster2
iface cluster2 inet static
\tovs_type OVSIntPort
\tovs_bridge vmbr1
\tovs_options tag=55
";

    #[test]
    fn test_duplicate_vlan_tag_detected() {
        let err = check_interfaces(TWO_VLAN55).unwrap_err();
        match err {
            MeshError::DuplicateVlanTag { tag, interfaces } => {
                assert_eq!(tag, 55);
                assert_eq!(interfaces, vec!["vlan55".to_string(), "cluster2".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_duplicate_bridge_detected() {
        let text = "auto vmbr1\niface vmbr1 inet manual\n\tovs_type OVSBridge\n\nauto vmbr1\niface vmbr1 inet manual\n\tovs_type OVSBridge\n";
        let err = check_interfaces(text).unwrap_err();
        assert!(matches!(err, MeshError::DuplicateBridge(ref b) if b == "vmbr1"));
    }

    #[test]
    fn test_duplicate_interface_detected() {
        let text = "iface eno1 inet manual\n\nauto eno1\niface eno1 inet manual\n\tovs_type OVSPort\n\tovs_bridge vmbr1\n";
        let err = check_interfaces(text).unwrap_err();
        assert!(matches!(err, MeshError::DuplicateInterface(ref n) if n == "eno1"));
    }

    #[test]
    fn test_same_name_in_two_families_allowed() {
        let text = "auto eno1\niface eno1 inet static\n\taddress 10.0.0.1/24\n\niface eno1 inet6 static\n\taddress fd00::1/64\n";
        assert!(check_interfaces(text).is_ok());
    }

    #[test]
    fn test_clean_file_summary() {
        let text = TWO_VLAN55
            .replacen("tag=55", "tag=60", 2)
            .replacen("tag=60", "tag=55", 1);
        let summary = check_interfaces(&text).unwrap();
        assert!(summary.has_bridge("vmbr1"));
        assert_eq!(summary.vlan_tags.keys().copied().collect::<Vec<_>>(), vec![55, 60]);
        assert_eq!(summary.stanza_count, 3);
    }

    #[test]
    fn test_frr_problems() {
        let good = "ip forwarding\nrouter openfabric 1\n net 49.0001.1000.0000.005e.00\n!\n";
        assert!(frr_problems(good, Some("49.0001.1000.0000.005e.00")).is_empty());
        assert!(frr_problems(good, None).is_empty());

        let wrong = frr_problems(good, Some("49.0001.1000.0000.005a.00"));
        assert_eq!(wrong.len(), 1);
        assert!(wrong[0].contains("was expected"));

        let empty = frr_problems("", None);
        assert_eq!(empty.len(), 3);
    }

    #[test]
    fn test_fabricd_enabled() {
        assert!(fabricd_enabled("bgpd=no\nfabricd=yes\n"));
        assert!(!fabricd_enabled("fabricd=no\n"));
    }
}
