//! Collaborator traits
//!
//! The conductor does not own a transport, a tar builder, or a shell
//! integration script generator. Those live in the embedding client and are
//! reached through the traits defined here.

use crate::types::ShellKind;
use std::io;

/// Write sink and lifecycle notifications for a conductor.
///
/// The delegate owns the actual transport (typically the stdin of an SSH
/// subprocess). The conductor only ever hands it opaque strings.
pub trait ConductorDelegate: Send + Sync {
    /// Write opaque bytes to the transport
    fn conductor_write(&self, data: &str);

    /// Fatal notification: the conductor cannot continue
    fn conductor_abort(&self, reason: &str);

    /// Orderly shutdown requested by the remote side
    fn conductor_quit(&self);
}

/// Receives each completed autopoll accumulation.
///
/// The framer streams process listings on a reserved side channel; once an
/// `EOF` sentinel arrives the joined payload is handed here and a fresh
/// autopoll request is issued.
pub trait ProcessInfoProvider: Send + Sync {
    fn autopoll_payload(&self, text: &str);
}

/// Builds the tar blob for a group of local paths bound for one remote
/// destination directory. Tar construction itself is the client's business;
/// the conductor base64-encodes whatever bytes come back.
pub trait PayloadPackager: Send + Sync {
    fn package(&self, local_paths: &[String]) -> io::Result<Vec<u8>>;
}

/// Computes the environment and argv to apply on the remote shell once the
/// shell integration script has been injected.
pub trait ShellIntegrationInjector: Send + Sync {
    /// Returns `(modified_vars, modified_command_args)`
    fn inject(
        &self,
        shell: ShellKind,
        vars: &[(String, String)],
        command_args: &[String],
    ) -> (Vec<(String, String)>, Vec<String>);
}

/// Injector that leaves vars and argv untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInjector;

impl ShellIntegrationInjector for NullInjector {
    fn inject(
        &self,
        _shell: ShellKind,
        vars: &[(String, String)],
        command_args: &[String],
    ) -> (Vec<(String, String)>, Vec<String>) {
        (vars.to_vec(), command_args.to_vec())
    }
}
