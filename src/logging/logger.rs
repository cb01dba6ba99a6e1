// file: src/logging/logger.rs
// version: 1.0.0
// guid: b9858a44-5f6f-454e-8d0e-7bb28bf5d3da

//! Logger initialization and configuration

use crate::error::MeshError;
use crate::Result;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default directory for run logs
pub const DEFAULT_LOG_DIR: &str = "/var/log/pve-mesh";

fn level_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Log file name for a run started now
pub fn log_file_name() -> String {
    format!(
        "pve-mesh-{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Initialize console logging plus a per-run log file in `log_dir`.
///
/// Returns the log file path, or `None` when the directory is not writable
/// and only the console is used.
pub fn init_logger(verbose: bool, quiet: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .with_filter(level_filter(verbose, quiet));

    let mut file_error = None;
    let file = log_dir.and_then(|dir| {
        let path = dir.join(log_file_name());
        let opened = fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new().create(true).append(true).open(&path)
        });
        match opened {
            Ok(file) => Some((file, path)),
            Err(e) => {
                file_error = Some(format!("{}: {}", dir.display(), e));
                None
            }
        }
    });

    let (file_layer, log_path) = match file {
        Some((file, path)) => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(level_filter(verbose, false)),
            ),
            Some(path),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MeshError::config(format!("Failed to initialize logger: {}", e)))?;

    if let Some(err) = file_error {
        tracing::warn!("File logging disabled, cannot open log directory {}", err);
    }
    if let Some(path) = &log_path {
        tracing::debug!("Logging to {}", path.display());
    }

    Ok(log_path)
}

/// Create a scoped logger for operations
pub fn with_operation_span<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let span = tracing::info_span!("operation", name = operation);
    let _enter = span.enter();
    f()
}
