//! Remote file RPC façade
//!
//! Thin async wrapper over the framer's `file` subcommands. Each public
//! call enqueues one command on the conductor's queue and suspends until
//! its handler fires completion; file operations therefore serialize with
//! everything else on the same conductor.
//!
//! Status mapping: a negative status means the connection went away before
//! the response; any positive status is reported as `FileNotFound` (the
//! framer does not distinguish permission errors from missing paths); zero
//! means the body decodes to the operation's result.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use cox_core::error::FileError;
use cox_protocol::command::FileSubcommand;
use cox_protocol::files::{FileSorting, RemoteFile};

use crate::conductor::SharedConductor;

/// Wire bytes for a path argument; non-UTF-8 local paths have no remote
/// counterpart
fn encode_path(path: &Path) -> Result<Vec<u8>, FileError> {
    path.to_str()
        .map(|s| s.as_bytes().to_vec())
        .ok_or(FileError::NotFound)
}

/// Async file operations on the host a conductor is attached to
pub struct RemoteFileSystem {
    conductor: SharedConductor,
}

impl RemoteFileSystem {
    pub fn new(conductor: SharedConductor) -> Self {
        Self { conductor }
    }

    async fn round_trip(&self, sub: FileSubcommand) -> Result<String, FileError> {
        let rx = self.conductor.lock().unwrap().enqueue_file(sub);
        let (body, status) = rx.await.map_err(|_| FileError::ConnectionClosed)?;
        if status < 0 {
            return Err(FileError::ConnectionClosed);
        }
        if status > 0 {
            return Err(FileError::FileNotFound);
        }
        Ok(body)
    }

    /// List a remote directory
    pub async fn list_files(
        &self,
        path: impl AsRef<Path>,
        sorting: FileSorting,
    ) -> Result<Vec<RemoteFile>, FileError> {
        let body = self
            .round_trip(FileSubcommand::Ls {
                path: encode_path(path.as_ref())?,
                sorting,
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| FileError::Internal(e.to_string()))
    }

    /// Fetch a remote file's contents
    pub async fn download(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, FileError> {
        let body = self
            .round_trip(FileSubcommand::Fetch {
                path: encode_path(path.as_ref())?,
            })
            .await?;
        let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact)
            .map_err(|e| FileError::Internal(e.to_string()))
    }

    /// Stat one remote path
    pub async fn stat(&self, path: impl AsRef<Path>) -> Result<RemoteFile, FileError> {
        let body = self
            .round_trip(FileSubcommand::Stat {
                path: encode_path(path.as_ref())?,
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| FileError::Internal(e.to_string()))
    }

    /// Delete a remote path
    pub async fn delete(&self, path: impl AsRef<Path>, recursive: bool) -> Result<(), FileError> {
        self.round_trip(FileSubcommand::Rm {
            path: encode_path(path.as_ref())?,
            recursive,
        })
        .await?;
        Ok(())
    }

    /// Create a remote symlink pointing at `source`
    pub async fn ln(
        &self,
        source: impl AsRef<Path>,
        symlink: impl AsRef<Path>,
    ) -> Result<RemoteFile, FileError> {
        let body = self
            .round_trip(FileSubcommand::Ln {
                source: encode_path(source.as_ref())?,
                symlink: encode_path(symlink.as_ref())?,
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| FileError::Internal(e.to_string()))
    }

    /// Move or rename a remote path
    pub async fn mv(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<RemoteFile, FileError> {
        let body = self
            .round_trip(FileSubcommand::Mv {
                source: encode_path(source.as_ref())?,
                dest: encode_path(dest.as_ref())?,
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| FileError::Internal(e.to_string()))
    }

    /// Create a remote directory
    pub async fn mkdir(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        self.round_trip(FileSubcommand::Mkdir {
            path: encode_path(path.as_ref())?,
        })
        .await?;
        Ok(())
    }

    /// Create a remote file with the given contents
    pub async fn create(&self, path: impl AsRef<Path>, content: &[u8]) -> Result<(), FileError> {
        self.round_trip(FileSubcommand::Create {
            path: encode_path(path.as_ref())?,
            content: content.to_vec(),
        })
        .await?;
        Ok(())
    }

    /// Reserved: atomic replace has no framer support yet
    pub async fn replace(
        &self,
        _path: impl AsRef<Path>,
        _content: &[u8],
    ) -> Result<(), FileError> {
        Err(FileError::NotImplemented("replace"))
    }

    /// Reserved: utimes has no framer support yet
    pub async fn set_modification_date(
        &self,
        _path: impl AsRef<Path>,
        _mtime: f64,
    ) -> Result<(), FileError> {
        Err(FileError::NotImplemented("setModificationDate"))
    }

    /// Reserved: chmod has no framer support yet
    pub async fn chmod(
        &self,
        _path: impl AsRef<Path>,
        _permissions: u32,
    ) -> Result<(), FileError> {
        Err(FileError::NotImplemented("chmod"))
    }
}
