// file: src/cli/args.rs
// version: 1.0.0
// guid: 345cab57-6f6a-439a-a7b6-77af5fbc3a66

//! Command line argument definitions

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pve-mesh")]
#[command(about = "Full-mesh OVS/VLAN/OpenFabric network setup for Proxmox VE nodes")]
#[command(version = crate::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        env = "PVE_MESH_PROFILE",
        default_value = "mesh",
        help = "Built-in network plan: mesh, mesh-jumbo or generic"
    )]
    pub profile: String,

    #[arg(long, global = true, help = "YAML network plan file (overrides --profile)")]
    pub plan: Option<String>,

    #[arg(long, global = true, help = "Operate on files below this root instead of /")]
    pub root: Option<String>,

    #[arg(long, global = true, help = "Directory for run logs [default: /var/log/pve-mesh]")]
    pub log_dir: Option<String>,
}

/// NIC selection flags
#[derive(Args, Clone, Debug, Default)]
pub struct InterfaceArgs {
    #[arg(long, help = "NIC for the public bridge")]
    pub eth0: Option<String>,

    #[arg(long, help = "First mesh link")]
    pub eth1: Option<String>,

    #[arg(long, help = "Second mesh link")]
    pub eth2: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, install and activate the configuration of this node
    Apply {
        #[arg(short, long, help = "Node ID (last octet of every address)")]
        node: Option<String>,

        #[arg(long, help = "Hostname written to frr.conf [default: system hostname]")]
        hostname: Option<String>,

        #[command(flatten)]
        interfaces: InterfaceArgs,

        #[arg(long, help = "Never prompt; fill gaps from the running system")]
        auto: bool,

        #[arg(long, help = "Only inspect the installed configuration")]
        check: bool,

        #[arg(long, help = "Leave frr.conf and the daemons file untouched")]
        no_frr: bool,

        #[arg(long, help = "Leave /etc/hosts untouched")]
        no_hosts: bool,

        #[arg(long, help = "Show what would be written without writing it")]
        dry_run: bool,

        #[arg(long, help = "Do not ask for confirmation")]
        force: bool,

        #[arg(long, help = "Write files but do not reload network or FRR")]
        no_reload: bool,

        #[arg(long, help = "Also set the system hostname with hostnamectl")]
        set_hostname: bool,
    },

    /// Render per-node files (interfaces.<node>, frr.conf.<node>) into a directory
    Generate {
        #[arg(short, long, conflicts_with = "all")]
        node: Option<String>,

        #[arg(long, help = "Every node ID the plan allows")]
        all: bool,

        #[arg(long, conflicts_with = "all")]
        hostname: Option<String>,

        #[arg(long, default_value = "eth0")]
        eth0: String,

        #[arg(long, default_value = "eth1")]
        eth1: String,

        #[arg(long, default_value = "eth2")]
        eth2: String,

        #[arg(short, long, default_value = ".")]
        output_dir: String,

        #[arg(long, help = "Print to stdout instead of writing files")]
        stdout: bool,
    },

    /// Show the address plan of a node
    Plan {
        #[arg(short, long)]
        node: String,

        #[arg(short, long)]
        json: bool,
    },

    /// Inspect the installed configuration
    Check {
        #[arg(short, long, help = "Also verify the NET of this node")]
        node: Option<String>,

        #[arg(long, help = "Query vtysh, ovs-vsctl and ip as well")]
        live: bool,

        #[arg(short, long)]
        json: bool,
    },

    /// Undo the most recent apply: restore replaced files, remove created ones
    Rollback {
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        no_reload: bool,
    },

    /// Retry reloading network and FRR without touching files
    Reload {
        #[arg(long)]
        no_frr: bool,
    },

    /// Check individual inputs without generating anything
    Validate {
        #[arg(long)]
        hostname: Option<String>,

        #[arg(short, long)]
        node: Option<String>,

        #[arg(long = "ip")]
        ips: Vec<String>,

        #[arg(long = "iface")]
        ifaces: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from([
            "pve-mesh", "apply", "--node", "94", "--eth0", "eno1", "--eth1", "ens1f0", "--eth2",
            "ens1f1", "--no-hosts", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Apply {
                node,
                interfaces,
                no_hosts,
                dry_run,
                no_frr,
                ..
            } => {
                assert_eq!(node.as_deref(), Some("94"));
                assert_eq!(interfaces.eth1.as_deref(), Some("ens1f0"));
                assert!(no_hosts);
                assert!(dry_run);
                assert!(!no_frr);
            }
            _ => panic!("expected apply"),
        }
        assert_eq!(cli.global.profile, "mesh");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pve-mesh", "plan", "-n", "7", "--profile", "generic", "-v"])
            .unwrap();
        assert_eq!(cli.global.profile, "generic");
        assert!(cli.global.verbose);
    }

    #[test]
    fn test_generate_node_conflicts_with_all() {
        assert!(Cli::try_parse_from(["pve-mesh", "generate", "--node", "90", "--all"]).is_err());
    }
}
