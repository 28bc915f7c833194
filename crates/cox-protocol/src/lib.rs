//! cox-protocol: Wire protocol for the Coxswain session conductor
//!
//! This crate defines the line-oriented text protocol spoken over the
//! interactive remote-shell transport: the command model and its wire
//! encoding, line chunking, parser event types, the recovery banner grammar,
//! and the JSON model for remote file metadata.

pub mod chunk;
pub mod command;
pub mod error;
pub mod event;
pub mod files;
pub mod quote;
pub mod recovery;

pub use chunk::{chunk_line, chunked_record, FRAMER_CONTINUATION, MAX_LINE_BYTES};
pub use command::{Command, FileSubcommand};
pub use error::ProtocolError;
pub use event::{BoundaryKind, ParserEvent};
pub use files::{FileSorting, RemoteFile, RemoteFileKind};
pub use quote::escape_shell_value;
pub use recovery::{classify_recovery_line, ConductorRecovery, RecoveryBuilder, RecoveryLine};
