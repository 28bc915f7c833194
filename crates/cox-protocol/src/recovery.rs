//! Recovery banner grammar
//!
//! After a client reconnects to a still-running framer, the parser delivers
//! `:recovery:` banner lines carrying the identity the framer saved at
//! login time. This module classifies those lines and rebuilds the identity
//! record.

use cox_core::types::RemotePid;

use crate::error::ProtocolError;

const BEGIN_MARKER: &str = ":begin-recovery";
const END_MARKER: &str = ":end-recovery";
const FIELD_PREFIX: &str = ":recovery: ";

/// Classification of one banner line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryLine {
    /// `:begin-recovery`
    Begin,
    /// `:recovery: KEY VALUE` (VALUE may be empty)
    Field { key: String, value: String },
    /// `:end-recovery`
    End,
    /// Anything else in the banner stream
    Other,
}

/// Classify one line of the recovery banner stream
pub fn classify_recovery_line(line: &str) -> RecoveryLine {
    if line == BEGIN_MARKER {
        return RecoveryLine::Begin;
    }
    if line == END_MARKER {
        return RecoveryLine::End;
    }
    if let Some(rest) = line.strip_prefix(FIELD_PREFIX) {
        let (key, value) = match rest.split_once(' ') {
            Some((key, value)) => (key, value),
            None => (rest, ""),
        };
        if !key.is_empty() {
            return RecoveryLine::Field {
                key: key.to_string(),
                value: value.to_string(),
            };
        }
    }
    RecoveryLine::Other
}

/// Identity of a framer rediscovered through the recovery banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConductorRecovery {
    /// PID of the framed login shell
    pub pid: RemotePid,
    pub dcs_id: String,
    pub sshargs: String,
    pub bool_args: String,
    pub client_unique_id: String,
}

/// Accumulates `:recovery:` fields until `:end-recovery`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryBuilder {
    login: Option<String>,
    dcs_id: Option<String>,
    sshargs: Option<String>,
    bool_args: Option<String>,
    client_unique_id: Option<String>,
}

impl RecoveryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one field. Unknown keys are ignored so the banner format can
    /// grow without breaking old clients.
    pub fn accumulate(&mut self, key: &str, value: &str) {
        let slot = match key {
            "login" => &mut self.login,
            "dcsID" => &mut self.dcs_id,
            "sshargs" => &mut self.sshargs,
            "boolArgs" => &mut self.bool_args,
            "clientUniqueID" => &mut self.client_unique_id,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    /// Finish the banner. Succeeds only if every field arrived and `login`
    /// is a positive PID.
    pub fn build(self) -> Result<ConductorRecovery, ProtocolError> {
        let login = self
            .login
            .ok_or(ProtocolError::MissingRecoveryField("login"))?;
        let pid: i32 = login
            .trim()
            .parse()
            .map_err(|_| ProtocolError::MalformedPid(login.clone()))?;
        if pid <= 0 {
            return Err(ProtocolError::MalformedPid(login));
        }
        Ok(ConductorRecovery {
            pid: RemotePid(pid),
            dcs_id: self
                .dcs_id
                .ok_or(ProtocolError::MissingRecoveryField("dcsID"))?,
            sshargs: self
                .sshargs
                .ok_or(ProtocolError::MissingRecoveryField("sshargs"))?,
            bool_args: self
                .bool_args
                .ok_or(ProtocolError::MissingRecoveryField("boolArgs"))?,
            client_unique_id: self
                .client_unique_id
                .ok_or(ProtocolError::MissingRecoveryField("clientUniqueID"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_markers() {
        assert_eq!(classify_recovery_line(":begin-recovery"), RecoveryLine::Begin);
        assert_eq!(classify_recovery_line(":end-recovery"), RecoveryLine::End);
        assert_eq!(classify_recovery_line("noise"), RecoveryLine::Other);
    }

    #[test]
    fn test_classify_field_with_empty_value() {
        // boolArgs is legitimately empty in real banners.
        match classify_recovery_line(":recovery: boolArgs ") {
            RecoveryLine::Field { key, value } => {
                assert_eq!(key, "boolArgs");
                assert_eq!(value, "");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_full_banner_builds() {
        let mut builder = RecoveryBuilder::new();
        for (key, value) in [
            ("login", "9999"),
            ("dcsID", "abc"),
            ("sshargs", "u@h"),
            ("boolArgs", ""),
            ("clientUniqueID", "x"),
        ] {
            builder.accumulate(key, value);
        }

        let recovery = builder.build().unwrap();
        assert_eq!(recovery.pid, RemotePid(9999));
        assert_eq!(recovery.dcs_id, "abc");
        assert_eq!(recovery.sshargs, "u@h");
        assert_eq!(recovery.bool_args, "");
        assert_eq!(recovery.client_unique_id, "x");
    }

    #[test]
    fn test_missing_field_fails() {
        let mut builder = RecoveryBuilder::new();
        builder.accumulate("login", "9999");
        builder.accumulate("dcsID", "abc");
        assert_eq!(
            builder.build().unwrap_err(),
            ProtocolError::MissingRecoveryField("sshargs")
        );
    }

    #[test]
    fn test_nonpositive_login_fails() {
        let mut builder = RecoveryBuilder::new();
        for (key, value) in [
            ("login", "0"),
            ("dcsID", "abc"),
            ("sshargs", "u@h"),
            ("boolArgs", ""),
            ("clientUniqueID", "x"),
        ] {
            builder.accumulate(key, value);
        }
        assert!(matches!(
            builder.build().unwrap_err(),
            ProtocolError::MalformedPid(_)
        ));
    }

    #[test]
    fn test_malformed_login_fails() {
        let mut builder = RecoveryBuilder::new();
        for (key, value) in [
            ("login", "not-a-pid"),
            ("dcsID", "abc"),
            ("sshargs", "u@h"),
            ("boolArgs", ""),
            ("clientUniqueID", "x"),
        ] {
            builder.accumulate(key, value);
        }
        assert!(matches!(
            builder.build().unwrap_err(),
            ProtocolError::MalformedPid(_)
        ));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut builder = RecoveryBuilder::new();
        builder.accumulate("futureField", "whatever");
        assert_eq!(builder, RecoveryBuilder::new());
    }
}
