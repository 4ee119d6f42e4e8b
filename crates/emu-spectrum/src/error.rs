//! Errors at the machine's fallible edges.
//!
//! The CPU and the devices never fail; only configuration, ROM images,
//! snapshots and file I/O do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ROM image must be {expected} bytes, got {actual}")]
    RomSize { expected: usize, actual: usize },

    #[error("snapshot RAM image must be {expected} bytes, got {actual}")]
    RamSize { expected: usize, actual: usize },

    #[error("snapshot was taken from a {snapshot} machine, this is a {machine}")]
    SnapshotMismatch {
        snapshot: &'static str,
        machine: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SpectrumError>;
