//! Background job registry
//!
//! A background job is a remote process spawned through the framer's `run`
//! command. Its stdout arrives as side-channel lines correlated by PID, and
//! its exit is reported by a later `terminate` event. Entries leave the
//! registry exactly when their `terminate` arrives.

use std::collections::HashMap;

use cox_core::types::RemotePid;

use crate::handler::CompletionFn;

/// One tracked remote process
pub struct BackgroundJob {
    /// Command line it was spawned with (for logs)
    pub cmdline: String,
    /// Accumulated channel-1 output lines
    lines: Vec<String>,
    completion: Option<CompletionFn>,
}

/// Remote PIDs with live completions
#[derive(Default)]
pub struct BackgroundJobs {
    jobs: HashMap<RemotePid, BackgroundJob>,
}

impl BackgroundJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly spawned process
    pub fn insert(&mut self, pid: RemotePid, cmdline: String, completion: CompletionFn) {
        if self.jobs.contains_key(&pid) {
            tracing::warn!(%pid, "background job PID collision; replacing older entry");
        }
        self.jobs.insert(
            pid,
            BackgroundJob {
                cmdline,
                lines: Vec::new(),
                completion: Some(completion),
            },
        );
    }

    /// Append one channel-1 line to a job's output. Returns false when the
    /// PID is not tracked.
    pub fn append_output(&mut self, pid: RemotePid, line: &str) -> bool {
        match self.jobs.get_mut(&pid) {
            Some(job) => {
                job.lines.push(line.to_string());
                true
            }
            None => false,
        }
    }

    /// Finish a job: fire its completion with the joined output and exit
    /// code, and drop the entry. Returns false when the PID is not tracked.
    pub fn terminate(&mut self, pid: RemotePid, code: i32) -> bool {
        match self.jobs.remove(&pid) {
            Some(mut job) => {
                tracing::debug!(%pid, code, cmdline = %job.cmdline, "background job finished");
                if let Some(completion) = job.completion.take() {
                    completion(job.lines.join("\n").into_bytes(), code);
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: RemotePid) -> bool {
        self.jobs.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
