//! Remote file metadata model
//!
//! The framer's `file` subcommands answer with JSON in this shape.

use serde::{Deserialize, Serialize};

/// Sort order for directory listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSorting {
    ByName,
    ByDate,
}

impl FileSorting {
    /// One-character wire token
    pub fn token(&self) -> &'static str {
        match self {
            Self::ByName => "n",
            Self::ByDate => "d",
        }
    }
}

/// What kind of directory entry a `RemoteFile` describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFileKind {
    File,
    Directory,
    Symlink,
}

/// One entry from a remote `ls`/`stat` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Entry name (absolute for `stat`, relative for `ls`)
    pub name: String,
    /// Entry kind
    pub kind: RemoteFileKind,
    /// Size in bytes, when the remote stat provided one
    #[serde(default)]
    pub size: Option<u64>,
    /// Modification time as a unix timestamp
    #[serde(default)]
    pub mtime: Option<f64>,
    /// Unix permission bits
    #[serde(default)]
    pub permissions: Option<u32>,
    /// Link target, present only for symlinks
    #[serde(default)]
    pub symlink_target: Option<String>,
}
