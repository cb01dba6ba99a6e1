// file: src/cli/commands.rs
// version: 1.0.0
// guid: 2baeecf8-24bf-4072-92d4-71df2f1a6412

//! Command implementations for the CLI

use crate::{
    cli::args::{GlobalArgs, InterfaceArgs},
    config::{loader::ConfigLoader, InterfaceAssignment, NetworkPlan, SystemPaths},
    deploy::{DeployOptions, MeshDeployer},
    error::MeshError,
    logging::logger::with_operation_span,
    mesh::{derive_addresses, inspect::frr_problems, render::describe, validator, ConfigGenerator},
    system::{
        atomic_write, interfaces::detect_physical_interfaces, CommandRunner, HostProbe,
        ServiceManager, SystemRunner, SystemUtils,
    },
    Result,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Options of the `apply` command
#[derive(Debug, Clone, Default)]
pub struct ApplyArgs {
    pub node: Option<String>,
    pub hostname: Option<String>,
    pub interfaces: InterfaceArgs,
    pub auto: bool,
    pub no_frr: bool,
    pub no_hosts: bool,
    pub dry_run: bool,
    pub force: bool,
    pub no_reload: bool,
    pub set_hostname: bool,
}

/// Plan and file locations selected by the global flags
pub struct CommandContext {
    pub plan: NetworkPlan,
    pub paths: SystemPaths,
    pub staged: bool,
}

impl CommandContext {
    pub fn from_args(global: &GlobalArgs) -> Result<Self> {
        let loader = ConfigLoader::new();
        let plan = loader.resolve_plan(&global.profile, global.plan.as_deref())?;
        let paths = match &global.root {
            Some(root) => SystemPaths::rooted(root),
            None => SystemPaths::default(),
        };
        Ok(Self {
            plan,
            paths,
            staged: global.root.is_some(),
        })
    }

    /// Root is needed to touch the live system files
    fn require_root(&self, action: &str) -> Result<()> {
        if self.staged || SystemUtils::is_root() {
            Ok(())
        } else {
            Err(MeshError::permission(format!(
                "{} modifies system files and must run as root (or use --root / --dry-run)",
                action
            )))
        }
    }
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(value) => print!("{} [{}]: ", label, value),
        None => print!("{}: ", label),
    }
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (false, _) => Ok(input.to_string()),
        (true, Some(value)) => Ok(value.to_string()),
        (true, None) => Err(MeshError::validation(format!("{} is required", label))),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Suggestion for every unset slot, taken in order from the detected NICs
/// that no slot names explicitly
fn suggest_interfaces(given: &[Option<String>; 3], detected: &[String]) -> [Option<String>; 3] {
    let mut unused = detected
        .iter()
        .filter(|name| !given.iter().any(|g| g.as_deref() == Some(name.as_str())));
    let mut suggestions: [Option<String>; 3] = Default::default();
    for (slot, value) in suggestions.iter_mut().zip(given) {
        if value.is_none() {
            *slot = unused.next().cloned();
        }
    }
    suggestions
}

/// Fill missing NICs from the detected physical interfaces, prompting unless `auto`
fn resolve_interfaces(args: &InterfaceArgs, auto: bool) -> Result<InterfaceAssignment> {
    let given = [args.eth0.clone(), args.eth1.clone(), args.eth2.clone()];
    let detected = if given.iter().any(|v| v.is_none()) {
        detect_physical_interfaces(&HostProbe)?
    } else {
        Vec::new()
    };
    let suggestions = suggest_interfaces(&given, &detected);

    let labels = ["Public NIC (eth0)", "Mesh link 1 (eth1)", "Mesh link 2 (eth2)"];
    let mut resolved = Vec::with_capacity(3);
    for (i, value) in given.into_iter().enumerate() {
        let name = match value {
            Some(name) => name,
            None if auto => suggestions[i].clone().ok_or_else(|| {
                MeshError::InterfaceNotFound(format!(
                    "{} (no unassigned physical NIC among {} detected)",
                    labels[i],
                    detected.len()
                ))
            })?,
            None => prompt(labels[i], suggestions[i].as_deref())?,
        };
        resolved.push(name);
    }

    Ok(InterfaceAssignment::new(
        resolved[0].clone(),
        resolved[1].clone(),
        resolved[2].clone(),
    ))
}

fn resolve_hostname(hostname: Option<String>, auto: bool) -> Result<String> {
    match hostname {
        Some(name) => Ok(name),
        None if auto => SystemUtils::current_hostname(),
        None => {
            let current = SystemUtils::current_hostname().ok();
            prompt("Hostname", current.as_deref())
        }
    }
}

fn resolve_node(node: Option<String>, hostname: &str, plan: &NetworkPlan, auto: bool) -> Result<String> {
    if let Some(node) = node {
        return Ok(node);
    }
    let known = plan
        .hosts
        .iter()
        .find(|h| h.hostname == hostname)
        .map(|h| h.node_id.to_string());

    match known {
        Some(id) if auto => {
            info!("Using node ID {} listed for {} in plan {}", id, hostname, plan.name);
            Ok(id)
        }
        None if auto => Err(MeshError::invalid_node_id(
            "<none>",
            format!("--node is required with --auto (allowed: {})", plan.node_ids),
        )),
        default => prompt(
            &format!("Node ID ({})", plan.node_ids),
            default.as_deref(),
        ),
    }
}

/// Generate, install and activate the configuration of this node
pub async fn apply_command(global: &GlobalArgs, args: ApplyArgs) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    info!("Applying network plan {}", context.plan.name);

    let hostname = resolve_hostname(args.hostname, args.auto)?;
    let node = resolve_node(args.node, &hostname, &context.plan, args.auto)?;
    let interfaces = resolve_interfaces(&args.interfaces, args.auto)?;

    let generator = ConfigGenerator::from_input(
        &hostname,
        &node,
        interfaces,
        context.plan.clone(),
        Some(&HostProbe),
    )?;
    let artifacts = with_operation_span("generate", || generator.generate())?;
    let config = generator.config();

    println!("{}", describe(&config.identity, &artifacts.addresses));

    if args.dry_run {
        println!("\n--- {} ---", context.paths.interfaces.display());
        println!("{}", artifacts.interfaces_file);
        if !args.no_frr {
            println!("--- {} ---", context.paths.frr_conf.display());
            println!("{}", artifacts.frr_config);
        }
        info!("Dry run, nothing written");
        return Ok(());
    }

    context.require_root("apply")?;

    if !args.force && !args.auto {
        println!(
            "\nThis replaces {} and reloads networking; a remote session may drop.",
            context.paths.interfaces.display()
        );
        if !confirm("Continue?")? {
            warn!("Aborted by user");
            return Ok(());
        }
    }

    let options = DeployOptions {
        write_frr: !args.no_frr,
        write_hosts: !args.no_hosts,
        reload: !args.no_reload,
        set_hostname: args.set_hostname,
    };

    let runner = SystemRunner;
    let deployer = MeshDeployer::new(context.paths, &runner);
    let report = deployer.deploy(config, &artifacts, &options).await?;

    for backup in &report.backups {
        info!("Backup: {}", backup.path.display());
    }
    info!(
        "Configuration applied for {} (node {}), {} files written",
        config.identity.hostname,
        config.identity.node_id,
        report.written.len()
    );
    Ok(())
}

fn default_hostname(plan: &NetworkPlan, node_id: u8) -> String {
    plan.hosts
        .iter()
        .find(|h| h.node_id == node_id)
        .map(|h| h.hostname.clone())
        .unwrap_or_else(|| format!("node{}", node_id))
}

/// Render per-node files without touching the system
pub async fn generate_command(
    global: &GlobalArgs,
    node: Option<String>,
    all: bool,
    hostname: Option<String>,
    interfaces: InterfaceAssignment,
    output_dir: &str,
    to_stdout: bool,
) -> Result<Vec<PathBuf>> {
    let context = CommandContext::from_args(global)?;
    let plan = &context.plan;

    let targets: Vec<(String, Option<String>)> = match (node, all) {
        (_, true) => plan.node_ids.ids().into_iter().map(|id| (id.to_string(), None)).collect(),
        (Some(node), false) => vec![(node, hostname)],
        (None, false) => {
            return Err(MeshError::validation("either --node or --all is required"));
        }
    };

    let output = Path::new(output_dir);
    if !to_stdout {
        std::fs::create_dir_all(output)?;
    }

    let mut written = Vec::new();
    for (node, hostname) in targets {
        let node_id = validator::validate_node_id(&node, &plan.node_ids)?;
        let hostname = hostname.unwrap_or_else(|| default_hostname(plan, node_id));
        let generator =
            ConfigGenerator::from_input(&hostname, &node, interfaces.clone(), plan.clone(), None)?;
        let artifacts = with_operation_span("generate", || generator.generate())?;

        if to_stdout {
            println!("# interfaces.{}", node_id);
            println!("{}", artifacts.interfaces_file);
            println!("# frr.conf.{}", node_id);
            println!("{}", artifacts.frr_config);
            continue;
        }

        let (interfaces_path, frr_path) = SystemPaths::per_node(output, node_id);
        atomic_write(&interfaces_path, &artifacts.interfaces_file)?;
        atomic_write(&frr_path, &artifacts.frr_config)?;
        info!(
            "Wrote {} and {}",
            interfaces_path.display(),
            frr_path.display()
        );
        written.push(interfaces_path);
        written.push(frr_path);
    }

    Ok(written)
}

/// Show the address plan of one node
pub async fn plan_command(global: &GlobalArgs, node: &str, json: bool) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    let node_id = validator::validate_node_id(node, &context.plan.node_ids)?;
    let addresses = derive_addresses(node_id, &context.plan);

    if json {
        println!("{}", serde_json::to_string_pretty(&addresses)?);
        return Ok(());
    }

    println!("Plan {} for node {}:", context.plan.name, node_id);
    println!("  public  {} via {}", addresses.public_ip, addresses.public_gateway);
    for vlan in &addresses.vlans {
        println!(
            "  {:<7} {:<16} {} (vlan {}{})",
            vlan.role.as_str(),
            vlan.cidr,
            vlan.interface,
            vlan.vlan_id,
            if vlan.fabric { ", fabric" } else { "" }
        );
    }
    println!("  net     {}", addresses.net_id);
    Ok(())
}

/// Problems seen by the running daemons. A command that cannot run is one
/// more problem, never the end of the report.
pub async fn live_problems(
    runner: &dyn CommandRunner,
    plan: &NetworkPlan,
    expected_net: Option<&str>,
) -> Vec<String> {
    let mut problems = Vec::new();
    let services = ServiceManager::new(runner, &plan.frr_service);

    match services.running_config().await {
        Ok(running) => problems.extend(
            frr_problems(&running, expected_net)
                .into_iter()
                .map(|p| format!("running FRR: {}", p)),
        ),
        Err(e) => problems.push(format!("vtysh: {}", e)),
    }

    match services.ovs_show().await {
        Ok(ovs) if !ovs.contains(&plan.mesh_bridge) => {
            problems.push(format!("OVS does not know bridge {}", plan.mesh_bridge))
        }
        Ok(_) => {}
        Err(e) => problems.push(format!("ovs-vsctl: {}", e)),
    }

    for vlan in &plan.vlans {
        let name = vlan.interface_name();
        match services.link_present(&name).await {
            Ok(true) => {}
            Ok(false) => problems.push(format!("link {} is not up", name)),
            Err(e) => problems.push(format!("ip link show {}: {}", name, e)),
        }
    }
    problems
}

/// Inspect the installed configuration, optionally asking the live daemons too
pub async fn check_command(global: &GlobalArgs, node: Option<String>, live: bool, json: bool) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    let expected_net = match node {
        Some(node) => {
            let node_id = validator::validate_node_id(&node, &context.plan.node_ids)?;
            Some(crate::mesh::derive_net_id(node_id))
        }
        None => None,
    };

    let runner = SystemRunner;
    let deployer = MeshDeployer::new(context.paths.clone(), &runner);
    let mut report = deployer.check(&context.plan, expected_net.as_deref())?;

    if live {
        let missing = SystemUtils::missing_commands();
        if !missing.is_empty() {
            report
                .problems
                .push(format!("missing commands: {}", missing.join(", ")));
        }

        report
            .problems
            .extend(live_problems(&runner, &context.plan, expected_net.as_deref()).await);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(summary) = &report.interfaces {
        println!(
            "Interfaces: {} stanzas, bridges {}",
            summary.stanza_count,
            summary.bridges.join(", ")
        );
    }

    if report.is_healthy() {
        info!("✓ Installed configuration matches plan {}", context.plan.name);
        Ok(())
    } else {
        for problem in &report.problems {
            error!("✗ {}", problem);
        }
        Err(MeshError::validation(format!(
            "{} problem(s) found",
            report.problems.len()
        )))
    }
}

/// Undo the most recent apply run
pub async fn rollback_command(global: &GlobalArgs, dry_run: bool, no_reload: bool) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    let runner = SystemRunner;
    let deployer = MeshDeployer::new(context.paths.clone(), &runner);

    if dry_run {
        match deployer.rollback_candidates()? {
            None => println!("No backups in {}", context.paths.backup_dir.display()),
            Some(run) => {
                println!("Run {} would be undone:", run.id);
                for record in &run.backups {
                    println!("  restore {} <- {}", record.source.display(), record.path.display());
                }
                for path in &run.created {
                    println!("  remove  {}", path.display());
                }
            }
        }
        return Ok(());
    }

    context.require_root("rollback")?;
    let run = deployer.rollback()?;
    info!(
        "Undid run {}: {} file(s) restored, {} removed",
        run.id,
        run.backups.len(),
        run.created.len()
    );

    if no_reload {
        info!("Skipping live reload");
        Ok(())
    } else {
        deployer.reload(&context.plan, true).await
    }
}

/// Retry the live reload after a failed apply
pub async fn reload_command(global: &GlobalArgs, no_frr: bool) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    context.require_root("reload")?;

    let runner = SystemRunner;
    let deployer = MeshDeployer::new(context.paths, &runner);
    deployer.reload(&context.plan, !no_frr).await
}

/// Check individual inputs
pub async fn validate_command(
    global: &GlobalArgs,
    hostname: Option<String>,
    node: Option<String>,
    ips: Vec<String>,
    ifaces: Vec<String>,
) -> Result<()> {
    let context = CommandContext::from_args(global)?;
    info!("Plan {} is valid", context.plan.name);

    let mut failures: Vec<MeshError> = Vec::new();
    let mut record = |label: String, result: Result<()>| match result {
        Ok(()) => info!("✓ {}", label),
        Err(e) => {
            error!("✗ {}: {}", label, e);
            failures.push(e);
        }
    };

    if let Some(hostname) = hostname {
        let result = validator::validate_hostname(&hostname);
        record(format!("hostname {}", hostname), result);
    }
    if let Some(node) = node {
        let result = validator::validate_node_id(&node, &context.plan.node_ids).map(|_| ());
        record(format!("node ID {}", node), result);
    }
    for ip in ips {
        let result = validator::validate_ip(&ip);
        record(format!("address {}", ip), result);
    }
    for iface in ifaces {
        let result = validator::validate_interface_exists(&iface, &HostProbe);
        record(format!("interface {}", iface), result);
    }

    // Report the first failure so its kind drives the exit status
    match failures.into_iter().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}
