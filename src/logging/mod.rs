// file: src/logging/mod.rs
// version: 1.0.0
// guid: c2dd192a-8407-4a07-a9f7-767653c79652

//! Logging system for the mesh network tool

pub mod logger;

pub use logger::{init_logger, DEFAULT_LOG_DIR};
