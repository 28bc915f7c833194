//! cox-conductor: Remote session conductor
//!
//! A conductor multiplexes one interactive remote-shell transport into a
//! user-facing terminal, background command execution, a remote file RPC,
//! and a recoverable, serializable session model supporting nested hops.
//!
//! The transport itself (an SSH subprocess and its PTY) and the terminal
//! emulator's DCS parser live in the embedding client; the conductor
//! consumes parsed events and produces opaque writes through a delegate.

pub mod conductor;
pub mod files;
pub mod framer;
pub mod handler;
pub mod jobs;
pub mod payload;
pub mod registry;
pub mod serialize;
pub mod state;

pub use conductor::{Conductor, ConductorArgs, SharedConductor};
pub use files::RemoteFileSystem;
pub use handler::{CompletionFn, ExecutionContext, Handler};
pub use payload::{group_payloads, normalize_destination, Payload, TarJob};
pub use serialize::{from_json, from_record, ConductorRecord};
pub use state::{RecoveryState, State};
