//! Global conductor registry
//!
//! Conductors register under their client-unique ID once their framer login
//! completes. After a reconnect, recovery records are matched back to live
//! conductors (and their ancestry) through this table.

use std::sync::{Mutex, OnceLock, Weak};

use dashmap::DashMap;

use crate::conductor::{Conductor, SharedConductor};

fn table() -> &'static DashMap<String, Weak<Mutex<Conductor>>> {
    static TABLE: OnceLock<DashMap<String, Weak<Mutex<Conductor>>>> = OnceLock::new();
    TABLE.get_or_init(DashMap::new)
}

/// Register a conductor under its client-unique ID
pub fn register(client_unique_id: &str, conductor: Weak<Mutex<Conductor>>) {
    tracing::debug!(id = client_unique_id, "registering conductor");
    table().insert(client_unique_id.to_string(), conductor);
}

/// Remove a conductor from the registry
pub fn deregister(client_unique_id: &str) {
    table().remove(client_unique_id);
}

/// Find a live conductor by client-unique ID
pub fn lookup(client_unique_id: &str) -> Option<SharedConductor> {
    table().get(client_unique_id)?.upgrade()
}

/// The chain from the named conductor to the root, child first.
/// Conductors that have been dropped are skipped.
pub fn ancestry(client_unique_id: &str) -> Vec<SharedConductor> {
    let mut chain = Vec::new();
    let mut current = lookup(client_unique_id);
    while let Some(conductor) = current {
        let parent = conductor.lock().unwrap().parent();
        chain.push(conductor);
        current = parent;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::{Conductor, ConductorArgs};
    use std::sync::Arc;

    #[test]
    fn test_recovery_registers_and_ancestry_walks_to_root() {
        let root = Conductor::shared(ConductorArgs::new("root@h", ""), None);
        let child = Conductor::shared(ConductorArgs::new("child@h", ""), Some(root));

        {
            let mut guard = child.lock().unwrap();
            for line in [
                ":begin-recovery",
                ":recovery: login 321",
                ":recovery: dcsID rd",
                ":recovery: sshargs child@h",
                ":recovery: boolArgs ",
                ":recovery: clientUniqueID registry-test-child",
            ] {
                guard.handle_recovery_line(line);
            }
            guard.handle_recovery_line(":end-recovery");
        }

        let found = lookup("registry-test-child").expect("conductor registered on recovery");
        assert!(Arc::ptr_eq(&found, &child));

        let chain = ancestry("registry-test-child");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].lock().unwrap().depth(), 1);
        assert_eq!(chain[1].lock().unwrap().depth(), 0);

        deregister("registry-test-child");
        assert!(lookup("registry-test-child").is_none());
    }
}
