//! Session persistence
//!
//! A conductor tree serializes to JSON so a client can stash its sessions
//! across a restart. The live state, queue and background jobs are
//! deliberately not persisted: the remote side is assumed to outlive the
//! client, and a restarted client reattaches through recovery. Decoded
//! conductors come back in ground state with an empty queue and the
//! `restored` flag set; the flag clears on the next delegate assignment.

use serde::{Deserialize, Serialize};

use cox_core::error::ConductorError;
use cox_core::types::ParsedArgs;

use crate::conductor::{Conductor, SharedConductor};
use crate::payload::Payload;

/// Serialized form of one conductor; parents nest top-down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorRecord {
    pub sshargs: String,
    pub bool_args: String,
    pub parsed_args: ParsedArgs,
    pub depth: u32,
    pub parent: Option<Box<ConductorRecord>>,
    pub dcs_id: String,
    pub client_unique_id: String,
    pub vars_to_send: Vec<(String, String)>,
    pub client_vars: Vec<(String, String)>,
    pub modified_vars: Option<Vec<(String, String)>>,
    pub modified_command_args: Option<Vec<String>>,
    pub initial_directory: Option<String>,
    pub should_inject_shell_integration: bool,
    pub payloads: Vec<Payload>,
    pub framed_pid: Option<i32>,
    pub autopoll_enabled: bool,
    pub verbose_framer: bool,
}

impl Conductor {
    /// Snapshot this conductor and its ancestors
    pub fn record(&self) -> ConductorRecord {
        self.snapshot_fields()
    }

    /// JSON form of `record()`
    pub fn json_value(&self) -> String {
        // ConductorRecord contains only plain data; this cannot fail.
        serde_json::to_string(&self.record()).unwrap_or_default()
    }
}

/// Rebuild a conductor chain from a record, outermost hop first
pub fn from_record(record: ConductorRecord) -> SharedConductor {
    let parent = record.parent.clone().map(|parent| from_record(*parent));
    Conductor::restore_fields(record, parent)
}

/// Rebuild a conductor chain from its JSON form
pub fn from_json(json: &str) -> Result<SharedConductor, ConductorError> {
    let record: ConductorRecord =
        serde_json::from_str(json).map_err(|e| ConductorError::Internal(e.to_string()))?;
    Ok(from_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::ConductorArgs;

    fn sample_args(id: &str) -> ConductorArgs {
        let mut args = ConductorArgs::new("user@example.com tmux attach", "-v");
        args.dcs_id = format!("dcs-{}", id);
        args.client_unique_id = format!("client-{}", id);
        args.vars_to_send = vec![("LANG".to_string(), "C.UTF-8".to_string())];
        args.initial_directory = Some("/srv".to_string());
        args
    }

    #[test]
    fn test_roundtrip_single() {
        let conductor = Conductor::shared(sample_args("a"), None);
        let json = conductor.lock().unwrap().json_value();

        let restored = from_json(&json).unwrap();
        let guard = restored.lock().unwrap();

        assert!(guard.is_restored());
        assert_eq!(guard.depth(), 0);
        assert_eq!(guard.dcs_id(), "dcs-a");
        assert_eq!(guard.sshargs(), "user@example.com tmux attach");
        assert_eq!(guard.state_description(), "ground");

        // Round-tripping the record itself is lossless.
        let record: ConductorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            guard.json_value()
        );
    }

    #[test]
    fn test_roundtrip_nested() {
        let root = Conductor::shared(sample_args("root"), None);
        let child = Conductor::shared(sample_args("child"), Some(root));

        let json = child.lock().unwrap().json_value();
        let restored = from_json(&json).unwrap();
        let guard = restored.lock().unwrap();

        assert_eq!(guard.depth(), 1);
        let parent = guard.parent().expect("parent chain restored");
        let parent = parent.lock().unwrap();
        assert_eq!(parent.depth(), 0);
        assert_eq!(parent.client_unique_id(), "client-root");
        assert!(parent.is_restored());
    }

    #[test]
    fn test_live_state_not_persisted() {
        let conductor = Conductor::shared(sample_args("b"), None);
        {
            let mut guard = conductor.lock().unwrap();
            // Queue up work with no transport attached; the queue drains,
            // and whatever state remains must not leak into the snapshot.
            guard.start();
        }
        let json = conductor.lock().unwrap().json_value();
        assert!(!json.contains("queue"));
        assert!(!json.contains("background"));

        let restored = from_json(&json).unwrap();
        assert_eq!(restored.lock().unwrap().state_description(), "ground");
        assert_eq!(restored.lock().unwrap().background_job_count(), 0);
    }
}
