// file: src/error.rs
// version: 1.0.0
// guid: 52e18633-ce0c-43cb-82a5-c50aca28565a

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, MeshError>;

/// Error types for the mesh configuration tool
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Invalid hostname '{0}': must be 1-63 alphanumeric characters or inner hyphens")]
    InvalidHostname(String),

    #[error("Invalid node ID '{value}': {reason}")]
    InvalidNodeId { value: String, reason: String },

    #[error("Invalid IP address '{0}': expected four dot-separated octets in 0-255")]
    InvalidIp(String),

    #[error("Network interface '{0}' not found on this host")]
    InterfaceNotFound(String),

    #[error("Duplicate VLAN tag {tag} on interfaces: {}", interfaces.join(", "))]
    DuplicateVlanTag { tag: u16, interfaces: Vec<String> },

    #[error("Duplicate bridge definition: {0}")]
    DuplicateBridge(String),

    #[error("Duplicate interface definition: {0}")]
    DuplicateInterface(String),

    #[error("Backup of {path} failed: {reason}")]
    BackupFailed { path: String, reason: String },

    #[error("Apply failed: {0}")]
    ApplyFailed(String),

    #[error("Could not acquire configuration lock {0}")]
    LockFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MeshError {
    /// Create a new node ID error
    pub fn invalid_node_id(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new backup error
    pub fn backup_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackupFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new apply error
    pub fn apply_failed(msg: impl Into<String>) -> Self {
        Self::ApplyFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a new system error
    pub fn system(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// True when the written configuration is intact and only the live
    /// reload needs to be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ApplyFailed(_))
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}
