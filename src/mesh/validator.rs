// file: src/mesh/validator.rs
// version: 1.0.0
// guid: 176926c6-cf40-4675-a0f1-02265af2b7c6

//! Input validation run before anything is rendered or written

use crate::config::{InterfaceAssignment, NodeIdPolicy};
use crate::error::{MeshError, Result};
use crate::system::interfaces::{is_valid_interface_name, InterfaceProbe};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").expect("Invalid hostname regex")
});

/// Validate a short hostname (RFC 1123 label)
pub fn validate_hostname(hostname: &str) -> Result<()> {
    debug!("Validating hostname: {}", hostname);

    if !HOSTNAME_RE.is_match(hostname) {
        return Err(MeshError::InvalidHostname(hostname.to_string()));
    }
    Ok(())
}

/// Parse and check a node ID against the plan's policy
pub fn validate_node_id(value: &str, policy: &NodeIdPolicy) -> Result<u8> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MeshError::invalid_node_id(value, "not an integer"));
    }

    let id: u8 = trimmed
        .parse()
        .map_err(|_| MeshError::invalid_node_id(value, "must fit in one octet (1-255)"))?;

    if !policy.allows(id) {
        return Err(MeshError::invalid_node_id(
            value,
            format!("must be {}", policy),
        ));
    }
    Ok(id)
}

/// Syntactic IPv4 check: four dot-separated integers in 0-255
pub fn validate_ip(value: &str) -> Result<()> {
    let parts: Vec<&str> = value.split('.').collect();
    let valid = parts.len() == 4
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.len() <= 3
                && p.bytes().all(|b| b.is_ascii_digit())
                && p.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
        });

    if !valid {
        return Err(MeshError::InvalidIp(value.to_string()));
    }
    Ok(())
}

/// Reject names the kernel would never accept before they reach a path or a
/// rendered file
pub fn validate_interface_name(name: &str) -> Result<()> {
    if !is_valid_interface_name(name) {
        return Err(MeshError::InterfaceNotFound(name.to_string()));
    }
    Ok(())
}

/// Syntax check of every NIC of an assignment
pub fn validate_interface_names(ifaces: &InterfaceAssignment) -> Result<()> {
    for name in ifaces.all() {
        validate_interface_name(name)?;
    }
    Ok(())
}

/// Check that a NIC is present right now. The answer can go stale before it
/// is used, so callers treat it as a precondition only.
pub fn validate_interface_exists(name: &str, probe: &dyn InterfaceProbe) -> Result<()> {
    validate_interface_name(name)?;
    if !probe.exists(name)? {
        return Err(MeshError::InterfaceNotFound(name.to_string()));
    }
    Ok(())
}

/// Check every NIC of an assignment
pub fn validate_interfaces(ifaces: &InterfaceAssignment, probe: &dyn InterfaceProbe) -> Result<()> {
    for name in ifaces.all() {
        validate_interface_exists(name, probe)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::interfaces::StaticProbe;

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("pve3").is_ok());
        assert!(validate_hostname("node-01").is_ok());
        assert!(validate_hostname("a").is_ok());
        assert!(validate_hostname(&"a".repeat(63)).is_ok());

        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("-pve").is_err());
        assert!(validate_hostname("pve-").is_err());
        assert!(validate_hostname("pve_3").is_err());
        assert!(validate_hostname("pve 3").is_err());
        assert!(validate_hostname(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_invalid_hostname_error_kind() {
        let err = validate_hostname("bad_name").unwrap_err();
        assert!(matches!(err, MeshError::InvalidHostname(ref h) if h == "bad_name"));
    }

    #[test]
    fn test_validate_node_id_range() {
        let policy = NodeIdPolicy::Range { min: 1, max: 254 };
        assert_eq!(validate_node_id("1", &policy).unwrap(), 1);
        assert_eq!(validate_node_id("254", &policy).unwrap(), 254);
        assert_eq!(validate_node_id(" 42 ", &policy).unwrap(), 42);

        assert!(validate_node_id("0", &policy).is_err());
        assert!(validate_node_id("255", &policy).is_err());
        assert!(validate_node_id("256", &policy).is_err());
        assert!(validate_node_id("-3", &policy).is_err());
        assert!(validate_node_id("9a", &policy).is_err());
        assert!(validate_node_id("", &policy).is_err());
    }

    #[test]
    fn test_validate_node_id_whitelist() {
        let policy = NodeIdPolicy::Whitelist {
            ids: vec![90, 91, 92, 93, 94],
        };
        assert_eq!(validate_node_id("90", &policy).unwrap(), 90);
        assert_eq!(validate_node_id("94", &policy).unwrap(), 94);

        let err = validate_node_id("95", &policy).unwrap_err();
        assert!(matches!(err, MeshError::InvalidNodeId { .. }));
        assert!(err.to_string().contains("one of {90,91,92,93,94}"));
    }

    #[test]
    fn test_validate_ip() {
        assert!(validate_ip("10.55.10.94").is_ok());
        assert!(validate_ip("0.0.0.0").is_ok());
        assert!(validate_ip("255.255.255.255").is_ok());

        assert!(validate_ip("10.55.10.256").is_err());
        assert!(validate_ip("10.55.10").is_err());
        assert!(validate_ip("abc.def.gha.b").is_err());
        assert!(validate_ip("10.55.10.94.1").is_err());
        assert!(validate_ip("10..10.94").is_err());
        assert!(validate_ip("+1.2.3.4").is_err());
        assert!(validate_ip("").is_err());
    }

    #[test]
    fn test_validate_interface_exists() {
        let probe = StaticProbe::new(["eno1", "ens1f0", "ens1f1"]);
        assert!(validate_interface_exists("eno1", &probe).is_ok());

        let err = validate_interface_exists("eth9", &probe).unwrap_err();
        assert!(matches!(err, MeshError::InterfaceNotFound(ref n) if n == "eth9"));
    }

    #[test]
    fn test_interface_names_checked_before_lookup() {
        let known = StaticProbe::new(["../../../etc", "eno 1"]);
        assert!(matches!(
            validate_interface_exists("../../../etc", &known),
            Err(MeshError::InterfaceNotFound(_))
        ));
        assert!(matches!(
            validate_interface_exists("eno 1", &known),
            Err(MeshError::InterfaceNotFound(_))
        ));
        assert!(validate_interface_exists("", &known).is_err());
    }

    #[test]
    fn test_validate_interface_names() {
        assert!(validate_interface_names(&InterfaceAssignment::new("eno1", "ens1f0", "ens1f1")).is_ok());
        let err =
            validate_interface_names(&InterfaceAssignment::new("eno1", "../../../etc", "ens1f1"))
                .unwrap_err();
        assert!(matches!(err, MeshError::InterfaceNotFound(ref n) if n == "../../../etc"));
    }

    #[test]
    fn test_validate_interfaces_reports_first_missing() {
        let probe = StaticProbe::new(["eno1", "ens1f0"]);
        let ifaces = InterfaceAssignment::new("eno1", "ens1f0", "eth9");
        let err = validate_interfaces(&ifaces, &probe).unwrap_err();
        assert_eq!(err.to_string(), "Network interface 'eth9' not found on this host");
    }
}
