//! Remote operation model and wire encoding
//!
//! Every operation the conductor can ask of the remote end is a `Command`.
//! Two families exist: plain commands interpreted by the login shell (or the
//! bootstrap reader that precedes it), and framer commands interpreted by
//! the injected helper once it is running. A command serializes to a
//! newline-separated record with no trailing newline; the dispatcher chunks
//! the record and appends the final newline at transmission time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use cox_core::types::RemotePid;

use crate::files::FileSorting;
use crate::quote::escape_shell_value;

/// Base64 content lines for `file create` are wrapped at this width
pub const CREATE_CONTENT_WIDTH: usize = 80;

/// A remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the bootstrap reader with the user's login shell
    ExecLoginShell,
    /// Set an environment variable in the remote shell
    Setenv { key: String, value: String },
    /// Run a command line in the remote shell
    Run(String),
    /// Feed a Python program to the remote interpreter. The source itself is
    /// delivered after the remote acknowledges, followed by an EOF sentinel.
    RunPython(String),
    /// Run a command and capture its output (used for probes)
    Shell(String),
    /// Upload a payload blob into a remote destination directory. The body
    /// is delivered after the remote acknowledges.
    Write { destination: String, content: String },
    /// Change the remote working directory
    Cd(String),
    /// Tear down the remote session
    Quit,
    /// Ask the bootstrap reader for shell, home directory and version
    GetShell,

    /// Spawn a background process under the framer
    FramerRun(String),
    /// Start the login shell under the framer's process manager
    FramerLogin { cwd: String, args: Vec<String> },
    /// Deliver keystrokes to a framed process's stdin
    FramerSend { data: Vec<u8>, pid: RemotePid },
    /// Kill a framed process
    FramerKill { pid: RemotePid },
    /// Tell the framer to exit
    FramerQuit,
    /// Subscribe to a process's output
    FramerRegister(RemotePid),
    /// Unsubscribe from a process's output
    FramerDeregister(RemotePid),
    /// Request one round of buffered output from all registered processes
    FramerPoll,
    /// Reset the framer's output routing state
    FramerReset,
    /// Start one autopoll round of remote process info
    FramerAutopoll,
    /// Persist key=value identity pairs on the remote side for recovery
    FramerSave(Vec<(String, String)>),
    /// Remote file manipulation
    FramerFile(FileSubcommand),
}

/// Subcommands of the framer's `file` command.
///
/// Path and content arguments are raw byte buffers; they travel base64
/// encoded so arbitrary filenames survive the text wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSubcommand {
    Ls { path: Vec<u8>, sorting: FileSorting },
    Fetch { path: Vec<u8> },
    Stat { path: Vec<u8> },
    Rm { path: Vec<u8>, recursive: bool },
    Ln { source: Vec<u8>, symlink: Vec<u8> },
    Mv { source: Vec<u8>, dest: Vec<u8> },
    Mkdir { path: Vec<u8> },
    Create { path: Vec<u8>, content: Vec<u8> },
}

impl FileSubcommand {
    /// Newline-separated wire tokens, without the leading `file` token
    pub fn wire_tokens(&self) -> Vec<String> {
        match self {
            Self::Ls { path, sorting } => vec![
                "ls".to_string(),
                BASE64.encode(path),
                sorting.token().to_string(),
            ],
            Self::Fetch { path } => vec!["fetch".to_string(), BASE64.encode(path)],
            Self::Stat { path } => vec!["stat".to_string(), BASE64.encode(path)],
            Self::Rm { path, recursive } => vec![
                "rm".to_string(),
                BASE64.encode(path),
                if *recursive { "r" } else { "-" }.to_string(),
            ],
            Self::Ln { source, symlink } => vec![
                "ln".to_string(),
                BASE64.encode(source),
                BASE64.encode(symlink),
            ],
            Self::Mv { source, dest } => vec![
                "mv".to_string(),
                BASE64.encode(source),
                BASE64.encode(dest),
            ],
            Self::Mkdir { path } => vec!["mkdir".to_string(), BASE64.encode(path)],
            Self::Create { path, content } => {
                let mut tokens = vec!["create".to_string(), BASE64.encode(path)];
                let encoded = BASE64.encode(content);
                let mut rest = encoded.as_str();
                while !rest.is_empty() {
                    let cut = CREATE_CONTENT_WIDTH.min(rest.len());
                    tokens.push(rest[..cut].to_string());
                    rest = &rest[cut..];
                }
                tokens
            }
        }
    }

    /// Short label for logs; paths are decoded lossily
    pub fn description(&self) -> String {
        let lossy = |p: &[u8]| String::from_utf8_lossy(p).into_owned();
        match self {
            Self::Ls { path, .. } => format!("ls {}", lossy(path)),
            Self::Fetch { path } => format!("fetch {}", lossy(path)),
            Self::Stat { path } => format!("stat {}", lossy(path)),
            Self::Rm { path, recursive } => {
                format!("rm{} {}", if *recursive { " -r" } else { "" }, lossy(path))
            }
            Self::Ln { source, symlink } => format!("ln {} {}", lossy(source), lossy(symlink)),
            Self::Mv { source, dest } => format!("mv {} {}", lossy(source), lossy(dest)),
            Self::Mkdir { path } => format!("mkdir {}", lossy(path)),
            Self::Create { path, content } => {
                format!("create {} ({} bytes)", lossy(path), content.len())
            }
        }
    }
}

impl Command {
    /// Whether this command targets the framer rather than the login shell
    pub fn is_framer(&self) -> bool {
        matches!(
            self,
            Self::FramerRun(_)
                | Self::FramerLogin { .. }
                | Self::FramerSend { .. }
                | Self::FramerKill { .. }
                | Self::FramerQuit
                | Self::FramerRegister(_)
                | Self::FramerDeregister(_)
                | Self::FramerPoll
                | Self::FramerReset
                | Self::FramerAutopoll
                | Self::FramerSave(_)
                | Self::FramerFile(_)
        )
    }

    /// Canonical wire form: a newline-separated record with no trailing
    /// newline.
    pub fn wire_value(&self) -> String {
        match self {
            Self::ExecLoginShell => "exec_login_shell".to_string(),
            Self::Setenv { key, value } => {
                format!("setenv {} {}", key, escape_shell_value(value))
            }
            Self::Run(cmdline) => format!("run {}", cmdline),
            Self::RunPython(_) => "runpython".to_string(),
            Self::Shell(cmdline) => format!("shell {}", cmdline),
            Self::Write { destination, .. } => format!("write {}", destination),
            Self::Cd(dir) => format!("cd {}", dir),
            Self::Quit => "quit".to_string(),
            Self::GetShell => "getshell".to_string(),

            Self::FramerRun(cmdline) => format!("run\n{}", cmdline),
            Self::FramerLogin { cwd, args } => {
                format!("login\n{}\n{}", cwd, args.join(" "))
            }
            Self::FramerSend { data, pid } => {
                format!("send\n{}\n{}", pid, BASE64.encode(data))
            }
            Self::FramerKill { pid } => format!("kill\n{}", pid),
            Self::FramerQuit => "quit".to_string(),
            Self::FramerRegister(pid) => format!("register\n{}", pid),
            // The deployed framer spells the token this way; reproducing it
            // is part of the wire ABI.
            Self::FramerDeregister(pid) => format!("dereigster\n{}", pid),
            Self::FramerPoll => "poll".to_string(),
            Self::FramerReset => "reset".to_string(),
            Self::FramerAutopoll => "autopoll".to_string(),
            Self::FramerSave(pairs) => {
                let mut record = String::from("save");
                for (key, value) in pairs {
                    record.push('\n');
                    record.push_str(key);
                    record.push('=');
                    record.push_str(value);
                }
                record
            }
            Self::FramerFile(sub) => {
                format!("file\n{}", sub.wire_tokens().join("\n"))
            }
        }
    }

    /// One-line label for logs
    pub fn operation_description(&self) -> String {
        match self {
            Self::ExecLoginShell => "exec login shell".to_string(),
            Self::Setenv { key, .. } => format!("setenv {}", key),
            Self::Run(cmdline) => format!("run {}", cmdline),
            Self::RunPython(_) => "run python bootstrap".to_string(),
            Self::Shell(cmdline) => format!("shell {}", cmdline),
            Self::Write { destination, .. } => format!("write payload to {}", destination),
            Self::Cd(dir) => format!("cd {}", dir),
            Self::Quit => "quit".to_string(),
            Self::GetShell => "get shell info".to_string(),
            Self::FramerRun(cmdline) => format!("framer run {}", cmdline),
            Self::FramerLogin { cwd, .. } => format!("framer login in {}", cwd),
            Self::FramerSend { data, pid } => {
                format!("framer send {} bytes to {}", data.len(), pid)
            }
            Self::FramerKill { pid } => format!("framer kill {}", pid),
            Self::FramerQuit => "framer quit".to_string(),
            Self::FramerRegister(pid) => format!("framer register {}", pid),
            Self::FramerDeregister(pid) => format!("framer deregister {}", pid),
            Self::FramerPoll => "framer poll".to_string(),
            Self::FramerReset => "framer reset".to_string(),
            Self::FramerAutopoll => "framer autopoll".to_string(),
            Self::FramerSave(_) => "framer save identity".to_string(),
            Self::FramerFile(sub) => format!("framer file {}", sub.description()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_wire_forms() {
        assert_eq!(Command::GetShell.wire_value(), "getshell");
        assert_eq!(Command::ExecLoginShell.wire_value(), "exec_login_shell");
        assert_eq!(
            Command::Shell("python3 -V".to_string()).wire_value(),
            "shell python3 -V"
        );
        assert_eq!(Command::Cd("/tmp".to_string()).wire_value(), "cd /tmp");
    }

    #[test]
    fn test_setenv_escapes_value() {
        let cmd = Command::Setenv {
            key: "PS1".to_string(),
            value: "$ ".to_string(),
        };
        assert_eq!(cmd.wire_value(), "setenv PS1 \\$ ");
    }

    #[test]
    fn test_framer_run_wire_form() {
        assert_eq!(
            Command::FramerRun("uptime".to_string()).wire_value(),
            "run\nuptime"
        );
    }

    #[test]
    fn test_framer_login_wire_form() {
        let cmd = Command::FramerLogin {
            cwd: "/home/u".to_string(),
            args: vec!["tmux".to_string(), "attach".to_string()],
        };
        assert_eq!(cmd.wire_value(), "login\n/home/u\ntmux attach");
    }

    #[test]
    fn test_framer_send_encodes_base64() {
        let cmd = Command::FramerSend {
            data: b"ls\n".to_vec(),
            pid: RemotePid(4321),
        };
        assert_eq!(cmd.wire_value(), format!("send\n4321\n{}", BASE64.encode(b"ls\n")));
    }

    #[test]
    fn test_deregister_misspelling_is_preserved() {
        // Wire ABI of the deployed framer.
        assert_eq!(
            Command::FramerDeregister(RemotePid(7)).wire_value(),
            "dereigster\n7"
        );
    }

    #[test]
    fn test_save_record() {
        let cmd = Command::FramerSave(vec![
            ("dcsID".to_string(), "abc".to_string()),
            ("sshargs".to_string(), "u@h".to_string()),
        ]);
        assert_eq!(cmd.wire_value(), "save\ndcsID=abc\nsshargs=u@h");
    }

    #[test]
    fn test_file_ls_wire_form() {
        let cmd = Command::FramerFile(FileSubcommand::Ls {
            path: b"/tmp".to_vec(),
            sorting: FileSorting::ByName,
        });
        assert_eq!(
            cmd.wire_value(),
            format!("file\nls\n{}\nn", BASE64.encode(b"/tmp"))
        );
    }

    #[test]
    fn test_file_create_wraps_content() {
        let content = vec![0xAB; 200]; // encodes well past one line
        let sub = FileSubcommand::Create {
            path: b"/tmp/out.bin".to_vec(),
            content: content.clone(),
        };
        let tokens = sub.wire_tokens();

        assert_eq!(tokens[0], "create");
        let body: String = tokens[2..].concat();
        for line in &tokens[2..] {
            assert!(line.len() <= CREATE_CONTENT_WIDTH);
        }
        assert_eq!(BASE64.decode(body).unwrap(), content);
    }

    #[test]
    fn test_rm_recursive_flag() {
        let flat = FileSubcommand::Rm {
            path: b"/tmp/x".to_vec(),
            recursive: false,
        };
        let deep = FileSubcommand::Rm {
            path: b"/tmp/x".to_vec(),
            recursive: true,
        };
        assert_eq!(flat.wire_tokens()[2], "-");
        assert_eq!(deep.wire_tokens()[2], "r");
    }

    #[test]
    fn test_framer_family() {
        assert!(Command::FramerPoll.is_framer());
        assert!(Command::FramerQuit.is_framer());
        assert!(!Command::Quit.is_framer());
        assert!(!Command::GetShell.is_framer());
    }
}
