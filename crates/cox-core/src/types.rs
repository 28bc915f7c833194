//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID on the remote host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePid(pub i32);

impl RemotePid {
    /// Create a new remote PID
    pub fn new(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the raw PID value
    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for RemotePid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for RemotePid {
    fn from(pid: i32) -> Self {
        Self(pid)
    }
}

/// Sentinel PID carried on autopoll side-channel lines.
///
/// Distinct from any real PID so that autopoll output can never be
/// mistaken for background-job output.
pub const AUTOPOLL_PID: RemotePid = RemotePid(-1);

/// Minimum remote Python version required to launch the framer
pub const MINIMUM_PYTHON_MAJOR: u32 = 3;
/// Minor component of the minimum remote Python version
pub const MINIMUM_PYTHON_MINOR: u32 = 7;

/// Returns true if `major.minor` is new enough to host the framer
pub fn python_version_supported(major: u32, minor: u32) -> bool {
    major > MINIMUM_PYTHON_MAJOR
        || (major == MINIMUM_PYTHON_MAJOR && minor >= MINIMUM_PYTHON_MINOR)
}

/// Login shell families the conductor knows how to integrate with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Zsh,
    Fish,
    Bash,
    Other,
}

impl ShellKind {
    /// Classify a login shell by its path (e.g. `/bin/bash`)
    pub fn from_path(path: &str) -> Self {
        match path.rsplit('/').next().unwrap_or(path) {
            "zsh" => Self::Zsh,
            "fish" => Self::Fish,
            "bash" => Self::Bash,
            _ => Self::Other,
        }
    }

    /// Whether shell integration may be injected into this shell.
    ///
    /// zsh and fish are always eligible. bash is eligible unless it is the
    /// macOS stock build, which rejects `--posix`: its version string
    /// contains both `GNU bash, version 3.2.57` and `apple-darwin`.
    pub fn supports_integration(&self, version: &str) -> bool {
        match self {
            Self::Zsh | Self::Fish => true,
            Self::Bash => {
                !(version.contains("GNU bash, version 3.2.57") && version.contains("apple-darwin"))
            }
            Self::Other => false,
        }
    }
}

/// Structured view of the opaque `sshargs` string.
///
/// The first token is the destination (the host fingerprint used for
/// identity); everything after it is the argv to run on the remote host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArgs {
    /// argv after the host
    pub command_args: Vec<String>,
    /// Host fingerprint
    pub identity: String,
}

impl ParsedArgs {
    /// Parse an `sshargs` string into its structured view
    pub fn parse(sshargs: &str) -> Self {
        let mut tokens = sshargs.split_whitespace();
        let identity = tokens.next().unwrap_or("").to_string();
        let command_args = tokens.map(str::to_string).collect();
        Self {
            command_args,
            identity,
        }
    }
}

impl fmt::Display for ParsedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_version_gate() {
        assert!(python_version_supported(3, 7));
        assert!(python_version_supported(3, 11));
        assert!(python_version_supported(4, 0));
        assert!(!python_version_supported(3, 6));
        assert!(!python_version_supported(2, 7));
    }

    #[test]
    fn test_shell_kind_from_path() {
        assert_eq!(ShellKind::from_path("/bin/zsh"), ShellKind::Zsh);
        assert_eq!(ShellKind::from_path("/usr/local/bin/fish"), ShellKind::Fish);
        assert_eq!(ShellKind::from_path("bash"), ShellKind::Bash);
        assert_eq!(ShellKind::from_path("/bin/tcsh"), ShellKind::Other);
    }

    #[test]
    fn test_stock_macos_bash_excluded() {
        let stock = "GNU bash, version 3.2.57(1)-release (x86_64-apple-darwin21)";
        assert!(!ShellKind::Bash.supports_integration(stock));

        let homebrew = "GNU bash, version 5.2.26(1)-release (aarch64-apple-darwin23.2.0)";
        assert!(ShellKind::Bash.supports_integration(homebrew));

        let linux = "GNU bash, version 3.2.57(1)-release (x86_64-pc-linux-gnu)";
        assert!(ShellKind::Bash.supports_integration(linux));
    }

    #[test]
    fn test_parsed_args() {
        let parsed = ParsedArgs::parse("user@example.com tmux attach");
        assert_eq!(parsed.identity, "user@example.com");
        assert_eq!(parsed.command_args, vec!["tmux", "attach"]);

        let bare = ParsedArgs::parse("user@example.com");
        assert!(bare.command_args.is_empty());
    }
}
