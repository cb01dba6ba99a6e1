// file: src/system/mod.rs
// version: 1.0.0
// guid: bc35122a-7c6f-4c9d-8cd1-80531feabc55

//! Host interaction: interfaces, commands, services and managed files

pub mod exec;
pub mod files;
pub mod interfaces;
pub mod service;

pub use exec::{CommandRunner, ExecResult, RecordingRunner, SystemRunner};
pub use files::{atomic_write, BackupRecord, BackupRun, BackupStore, ConfigLock};
pub use interfaces::{HostProbe, InterfaceProbe, StaticProbe};
pub use service::{ServiceManager, SystemUtils};
