// file: src/cli/mod.rs
// version: 1.0.0
// guid: e3611a8e-749d-4314-9b21-d123a13b6294

//! Command line interface for pve-mesh

pub mod args;
pub mod commands;

pub use args::Cli;
pub use commands::*;
