//! Error types for mstat operations

use std::io;
use thiserror::Error;

/// Result type for mstat operations
pub type Result<T> = std::result::Result<T, MstatError>;

/// Errors that can occur while launching and measuring a command
#[derive(Error, Debug)]
pub enum MstatError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Creating, populating, reading or deleting the cgroup failed
    #[error("Cgroup error: {0}")]
    ResourceContext(String),

    /// The parent/child handshake pipe misbehaved. Always an internal bug.
    #[error("internal error: handshake: {0}")]
    Handshake(String),

    #[error("Failed to spawn: {0}")]
    Spawn(String),

    #[error("Failed to wait for child: {0}")]
    Wait(String),

    #[error("Failed to drop privileges: {0}")]
    Privilege(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Process exited with code {code}")]
    TargetExit { code: i32 },

    #[error("Process killed by signal {signal}")]
    TargetSignal { signal: i32 },
}

impl MstatError {
    /// True for errors raised by the handshake protocol between supervisor and bootstrap
    pub fn is_protocol_bug(&self) -> bool {
        matches!(self, MstatError::Handshake(_))
    }
}
