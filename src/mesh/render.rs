// file: src/mesh/render.rs
// version: 1.0.0
// guid: e9419211-213f-4ff5-99d7-acafdf5743f0

//! Rendering of the interfaces file, frr.conf, the daemons flag and the hosts block
//!
//! The fixed skeleton lives here; everything node specific comes from the
//! [`MeshConfig`] and the derived [`AddressPlan`]. Output is a pure function of
//! its inputs so that repeated runs produce byte-identical files.

use super::address::{host_address, strip_prefix_len, AddressPlan};
use super::stanza::Stanza;
use crate::config::{MeshConfig, NetworkPlan, NodeIdentity, VlanRole};
use tracing::debug;

/// Marker line opening the cluster block in /etc/hosts
pub const HOSTS_MARKER: &str = "# Proxmox Mesh Cluster Nodes";

/// OpenFabric instance tag used throughout frr.conf
pub const OPENFABRIC_TAG: &str = "1";

const FRR_HELLO: [(&str, &str); 3] = [
    ("csnp-interval", "2"),
    ("hello-interval", "1"),
    ("hello-multiplier", "2"),
];

const FRR_LSP_TIMERS: [(&str, &str); 3] = [
    ("lsp-gen-interval", "1"),
    ("max-lsp-lifetime", "600"),
    ("lsp-refresh-interval", "180"),
];

fn header(config: &MeshConfig) -> String {
    format!(
        "# Generated by pve-mesh for {} (node {}, plan {}). Manual edits are overwritten.\n",
        config.identity.hostname, config.identity.node_id, config.plan.name
    )
}

/// Build the ordered stanza list for the interfaces file
pub fn interfaces_stanzas(config: &MeshConfig, plan: &AddressPlan) -> Vec<Stanza> {
    let network = &config.plan;
    let ifaces = &config.interfaces;
    let mesh_ports = ifaces.mesh_ports();
    let mut stanzas = Vec::new();

    stanzas.push(Stanza::new("lo", "loopback").auto());

    stanzas.push(Stanza::new(&ifaces.public, "manual"));
    stanzas.push(
        Stanza::new(&network.public_bridge, "static")
            .auto()
            .option("address", &plan.public_ip)
            .option("gateway", &plan.public_gateway)
            .option("bridge-ports", &ifaces.public)
            .option("bridge-stp", "off")
            .option("bridge-fd", "0")
            .option("mtu", network.public_mtu.to_string()),
    );

    let port_options = format!(
        "other_config:rstp-enable=true other_config:rstp-path-cost={} \
         other_config:rstp-port-admin-edge=false other_config:rstp-port-auto-edge=false \
         other_config:rstp-port-mcheck=true vlan_mode=native-untagged",
        network.rstp.path_cost
    );
    for port in &mesh_ports {
        stanzas.push(
            Stanza::new(*port, "manual")
                .auto()
                .option("ovs_type", "OVSPort")
                .option("ovs_bridge", &network.mesh_bridge)
                .option("ovs_mtu", network.mesh_mtu.to_string())
                .option("ovs_options", &port_options),
        );
    }

    let mut bridge_members: Vec<String> = mesh_ports.iter().map(|p| p.to_string()).collect();
    bridge_members.extend(plan.vlans.iter().map(|v| v.interface.clone()));
    stanzas.push(
        Stanza::new(&network.mesh_bridge, "manual")
            .auto()
            .option("ovs_type", "OVSBridge")
            .option("ovs_ports", bridge_members.join(" "))
            .option("ovs_mtu", network.mesh_mtu.to_string())
            .option(
                "up",
                format!(
                    "ovs-vsctl set Bridge ${{IFACE}} rstp_enable=true \
                     other_config:rstp-priority={} other_config:rstp-forward-delay={} \
                     other_config:rstp-max-age={}",
                    network.rstp.priority, network.rstp.forward_delay, network.rstp.max_age
                ),
            )
            .option("post-up", "sleep 10"),
    );

    for vlan in &plan.vlans {
        stanzas.push(
            Stanza::new(&vlan.interface, "static")
                .auto()
                .option("ovs_type", "OVSIntPort")
                .option("ovs_bridge", &network.mesh_bridge)
                .option("ovs_mtu", network.mesh_mtu.to_string())
                .option("ovs_options", format!("tag={}", vlan.vlan_id))
                .option("address", &vlan.cidr)
                .option(
                    "post-up",
                    format!("/usr/bin/systemctl restart {}", network.frr_service),
                ),
        );
    }

    stanzas
}

/// Render /etc/network/interfaces for one node
pub fn render_interfaces_file(config: &MeshConfig, plan: &AddressPlan) -> String {
    debug!(
        "Rendering interfaces file for {} (node {})",
        config.identity.hostname, config.identity.node_id
    );

    let mut out = header(config);
    for stanza in interfaces_stanzas(config, plan) {
        out.push('\n');
        out.push_str(&stanza.to_string());
    }
    out.push_str("\nsource /etc/network/interfaces.d/*\n");
    out
}

/// One `!`-terminated block of frr.conf
struct FrrBlock {
    head: String,
    lines: Vec<String>,
}

impl FrrBlock {
    fn new(head: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.head);
        out.push('\n');
        for line in &self.lines {
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("!\n");
    }
}

/// Render /etc/frr/frr.conf for one node
pub fn render_frr_config(config: &MeshConfig, plan: &AddressPlan) -> String {
    debug!("Rendering frr.conf for {}", config.identity.hostname);

    let mut out = String::new();
    out.push_str(&header(config).replacen('#', "!", 1));
    out.push_str("frr defaults traditional\n");
    out.push_str(&format!("hostname {}\n", config.identity.hostname));
    out.push_str("log syslog informational\n");
    out.push_str("ip forwarding\n");
    out.push_str("no ipv6 forwarding\n");
    out.push_str("service integrated-vtysh-config\n");
    out.push_str("!\n");

    if let Some(cluster) = plan.vlan(VlanRole::Cluster) {
        FrrBlock::new("interface lo")
            .line(format!("ip address {}/32", strip_prefix_len(&cluster.cidr)))
            .line(format!("ip router openfabric {}", OPENFABRIC_TAG))
            .line("openfabric passive")
            .write_to(&mut out);
    }

    for vlan in plan.vlans.iter().filter(|v| v.fabric) {
        let mut block = FrrBlock::new(format!("interface {}", vlan.interface))
            .line(format!("ip router openfabric {}", OPENFABRIC_TAG));
        for (key, value) in FRR_HELLO {
            block = block.line(format!("openfabric {} {}", key, value));
        }
        block.write_to(&mut out);
    }

    out.push_str("line vty\n!\n");

    let mut router = FrrBlock::new(format!("router openfabric {}", OPENFABRIC_TAG))
        .line(format!("net {}", plan.net_id));
    for (key, value) in FRR_LSP_TIMERS {
        router = router.line(format!("{} {}", key, value));
    }
    router.write_to(&mut out);

    out
}

/// Turn on fabricd in /etc/frr/daemons. Returns the new content and whether
/// anything changed.
pub fn enable_fabricd(daemons: &str) -> (String, bool) {
    let mut changed = false;
    let mut found = false;
    let mut lines: Vec<String> = Vec::new();

    for line in daemons.lines() {
        match line.trim() {
            "fabricd=no" => {
                lines.push("fabricd=yes".to_string());
                changed = true;
                found = true;
            }
            "fabricd=yes" => {
                lines.push(line.to_string());
                found = true;
            }
            _ => lines.push(line.to_string()),
        }
    }

    if !found {
        lines.push("fabricd=yes".to_string());
        changed = true;
    }

    let mut out = lines.join("\n");
    out.push('\n');
    (out, changed)
}

/// The /etc/hosts block listing every cluster member on the cluster VLAN.
/// `None` when the plan has no host list.
pub fn render_hosts_block(network: &NetworkPlan) -> Option<String> {
    if network.hosts.is_empty() {
        return None;
    }
    let cluster = network.vlan(VlanRole::Cluster)?;

    let mut block = String::new();
    block.push_str(HOSTS_MARKER);
    block.push('\n');
    for host in &network.hosts {
        block.push_str(&format!(
            "{} {}\n",
            host_address(&cluster.prefix, host.node_id),
            host.hostname
        ));
    }
    Some(block)
}

/// Append the cluster block to an existing hosts file. `None` when the block
/// is already present.
pub fn merge_hosts(existing: &str, block: &str) -> Option<String> {
    if existing.lines().any(|l| l.trim() == HOSTS_MARKER) {
        return None;
    }
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(block);
    Some(out)
}

/// Short summary used in dry-run output and logs
pub fn describe(identity: &NodeIdentity, plan: &AddressPlan) -> String {
    let mut lines = vec![
        format!("hostname: {}", identity.hostname),
        format!("node id:  {}", identity.node_id),
        format!("public:   {}", plan.public_ip),
    ];
    for vlan in &plan.vlans {
        lines.push(format!(
            "{:<9} {} ({}, vlan {})",
            format!("{}:", vlan.role),
            vlan.cidr,
            vlan.interface,
            vlan.vlan_id
        ));
    }
    lines.push(format!("net:      {}", plan.net_id));
    lines.join("\n")
}
