// file: src/main.rs
// version: 1.0.0
// guid: e55d5744-893c-4d3e-baa9-5dc00efb449b

//! pve-mesh - Main entry point

use clap::Parser;
use pve_mesh::{
    cli::{args::Commands, commands::*, Cli},
    config::{InterfaceAssignment, SystemPaths},
    logging::{init_logger, DEFAULT_LOG_DIR},
    Result,
};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

fn log_dir(cli: &Cli) -> PathBuf {
    match (&cli.global.log_dir, &cli.global.root) {
        (Some(dir), _) => PathBuf::from(dir),
        (None, Some(root)) => SystemPaths::rooted(root).log_dir,
        (None, None) => PathBuf::from(DEFAULT_LOG_DIR),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Apply {
            node,
            hostname,
            interfaces,
            auto,
            check,
            no_frr,
            no_hosts,
            dry_run,
            force,
            no_reload,
            set_hostname,
        } => {
            if check {
                return check_command(&global, node, false, false).await;
            }
            let args = ApplyArgs {
                node,
                hostname,
                interfaces,
                auto,
                no_frr,
                no_hosts,
                dry_run,
                force,
                no_reload,
                set_hostname,
            };
            apply_command(&global, args).await
        }
        Commands::Generate {
            node,
            all,
            hostname,
            eth0,
            eth1,
            eth2,
            output_dir,
            stdout,
        } => {
            let interfaces = InterfaceAssignment::new(eth0, eth1, eth2);
            generate_command(&global, node, all, hostname, interfaces, &output_dir, stdout)
                .await
                .map(|_| ())
        }
        Commands::Plan { node, json } => plan_command(&global, &node, json).await,
        Commands::Check { node, live, json } => check_command(&global, node, live, json).await,
        Commands::Rollback { dry_run, no_reload } => {
            rollback_command(&global, dry_run, no_reload).await
        }
        Commands::Reload { no_frr } => reload_command(&global, no_frr).await,
        Commands::Validate {
            hostname,
            node,
            ips,
            ifaces,
        } => validate_command(&global, hostname, node, ips, ifaces).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let dir = log_dir(&cli);
    if let Err(e) = init_logger(cli.global.verbose, cli.global.quiet, Some(&dir)) {
        eprintln!("{}", e);
    }

    let shutdown_signal = async {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping");
        }
    };

    let result = tokio::select! {
        result = run(cli) => result,
        _ = shutdown_signal => {
            warn!("Interrupted by user");
            std::process::exit(130);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        if e.is_recoverable() {
            info!("Configuration files are in place; run `pve-mesh reload` to retry activation");
        }
        std::process::exit(e.exit_code());
    }
}
