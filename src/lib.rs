// file: src/lib.rs
// version: 1.0.0
// guid: 260acaf7-1a14-4b86-9c34-bebe29ef3555

//! # pve-mesh
//!
//! Generates and installs the network configuration of a Proxmox VE node in
//! a three-node full mesh: an OVS bridge carrying VLAN interfaces for cluster
//! and Ceph traffic, routed with FRR OpenFabric.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod logging;
pub mod mesh;
pub mod system;

pub use error::{MeshError, Result};

/// Version information for the tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
