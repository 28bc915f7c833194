//! cox-core: Core abstractions for the Coxswain session conductor
//!
//! This crate provides the shared types, error taxonomy, configuration
//! structures and collaborator traits used by the conductor and CLI
//! components.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConductorError, ConfigError, FileError};
pub use traits::{ConductorDelegate, PayloadPackager, ProcessInfoProvider, ShellIntegrationInjector};
pub use types::{ParsedArgs, RemotePid, ShellKind, AUTOPOLL_PID};
