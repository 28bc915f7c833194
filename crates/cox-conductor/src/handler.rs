//! Response handlers
//!
//! Every command travels with a handler describing how to consume the
//! response events between its `command-begin` and `command-end` boundary.
//! Handlers that deliver results asynchronously carry a completion; the
//! completion is dropped (not persisted) when a conductor is serialized,
//! since pending in-flight commands do not survive a client restart.

use std::fmt;

use tokio::sync::oneshot;

use cox_protocol::Command;

/// Callback delivering `(output, status)` for run/poll style commands
pub type CompletionFn = Box<dyn FnOnce(Vec<u8>, i32) + Send>;

/// Completion side of a file RPC round trip: `(joined lines, status)`
pub type FileCompletion = oneshot::Sender<(String, i32)>;

/// How to consume the response to an in-flight command
pub enum Handler {
    /// Ignore lines; any nonzero exit status is a fatal failure
    FailIfNonzeroStatus,
    /// Collect lines; on end, parse the Python version and pick the
    /// framing or plain-login path
    CheckForPython { lines: Vec<String> },
    /// Ignore everything
    FireAndForget,
    /// Collect lines; the body must be the framed login shell's PID
    FramerLogin { lines: Vec<String> },
    /// On status 0, write the stored body verbatim followed by an EOF
    /// sentinel line
    WriteOnSuccess { body: String },
    /// First response line is the spawned PID; register it as a
    /// background job carrying the completion
    RunRemoteCommand {
        cmdline: String,
        completion: Option<CompletionFn>,
    },
    /// Accumulate lines; on end, deliver the joined output
    Poll {
        lines: Vec<String>,
        completion: Option<CompletionFn>,
    },
    /// Collect lines; on end, parse shell/home/version and continue the
    /// launch sequence
    GetShell { lines: Vec<String> },
    /// Collect lines; on end deliver `(joined, status)`, on abort
    /// deliver `("", -1)`
    File {
        lines: Vec<String>,
        completion: Option<FileCompletion>,
    },
}

impl Handler {
    /// Short label for logs
    pub fn describe(&self) -> &'static str {
        match self {
            Self::FailIfNonzeroStatus => "fail-if-nonzero",
            Self::CheckForPython { .. } => "check-for-python",
            Self::FireAndForget => "fire-and-forget",
            Self::FramerLogin { .. } => "framer-login",
            Self::WriteOnSuccess { .. } => "write-on-success",
            Self::RunRemoteCommand { .. } => "run-remote-command",
            Self::Poll { .. } => "poll",
            Self::GetShell { .. } => "get-shell",
            Self::File { .. } => "file",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// An in-flight or queued command paired with its response handler
#[derive(Debug)]
pub struct ExecutionContext {
    pub command: Command,
    pub handler: Handler,
}

impl ExecutionContext {
    pub fn new(command: Command, handler: Handler) -> Self {
        Self { command, handler }
    }
}
