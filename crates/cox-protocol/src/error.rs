//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding protocol traffic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A value that should have been a positive PID was not
    #[error("Malformed PID: {0:?}")]
    MalformedPid(String),

    /// A recovery banner ended before all identity fields arrived
    #[error("Missing recovery field: {0}")]
    MissingRecoveryField(&'static str),
}
