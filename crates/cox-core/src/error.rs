//! Error types for the Coxswain ecosystem

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the conductor state machine
#[derive(Error, Debug)]
pub enum ConductorError {
    /// The transport delegate went away
    #[error("Transport closed")]
    TransportClosed,

    /// The remote side violated the wire protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Internal invariant failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// The operation was abandoned because the queue was drained
    #[error("Aborted")]
    Aborted,
}

/// Errors surfaced by the remote file RPC
#[derive(Error, Debug)]
pub enum FileError {
    /// The connection closed before the response arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// The remote side reported a nonzero status for the path
    #[error("File not found")]
    FileNotFound,

    /// A path argument could not be encoded for the wire
    #[error("Path could not be encoded")]
    NotFound,

    /// The remote response body could not be decoded
    #[error("Undecodable remote response: {0}")]
    Internal(String),

    /// Reserved operation with no framer support yet
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
