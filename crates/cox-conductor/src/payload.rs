//! Payload grouping and destination normalization
//!
//! Local files bound for the remote host are grouped by destination
//! directory; each group becomes one tar blob uploaded through a single
//! `write` command. Tar construction itself belongs to the client's
//! `PayloadPackager`.

use serde::{Deserialize, Serialize};

/// One local path bound for a remote destination directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub local_path: String,
    pub destination: String,
}

/// A group of local paths sharing one remote destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarJob {
    pub destination: String,
    pub local_paths: Vec<String>,
}

/// Normalize a remote destination path.
///
/// `~` and `~/` mean the remote home directory, spelled `/$HOME` so the
/// remote shell expands it. Relative paths are rooted there too. Trailing
/// slashes are stripped, except on the root itself. Idempotent.
pub fn normalize_destination(path: &str) -> String {
    let mut out = if path == "~" || path == "~/" {
        "/$HOME".to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("/$HOME/{}", rest)
    } else if !path.starts_with('/') {
        format!("/$HOME/{}", path)
    } else {
        path.to_string()
    };

    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Group payloads by normalized destination, preserving first-seen order
pub fn group_payloads(payloads: &[Payload]) -> Vec<TarJob> {
    let mut jobs: Vec<TarJob> = Vec::new();
    for payload in payloads {
        let destination = normalize_destination(&payload.destination);
        match jobs.iter_mut().find(|job| job.destination == destination) {
            Some(job) => job.local_paths.push(payload.local_path.clone()),
            None => jobs.push(TarJob {
                destination,
                local_paths: vec![payload.local_path.clone()],
            }),
        }
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_aliases() {
        assert_eq!(normalize_destination("~"), "/$HOME");
        assert_eq!(normalize_destination("~/"), "/$HOME");
        assert_eq!(normalize_destination("~/bin"), "/$HOME/bin");
    }

    #[test]
    fn test_relative_rooted_at_home() {
        assert_eq!(normalize_destination("scripts"), "/$HOME/scripts");
    }

    #[test]
    fn test_absolute_untouched() {
        assert_eq!(normalize_destination("/opt/tools"), "/opt/tools");
    }

    #[test]
    fn test_trailing_slashes_stripped() {
        assert_eq!(normalize_destination("/opt/tools///"), "/opt/tools");
        assert_eq!(normalize_destination("/"), "/");
    }

    #[test]
    fn test_idempotent() {
        for path in ["~", "~/bin", "scripts", "/opt/tools/", "/"] {
            let once = normalize_destination(path);
            assert_eq!(normalize_destination(&once), once);
        }
    }

    #[test]
    fn test_grouping_preserves_order() {
        let payloads = vec![
            Payload {
                local_path: "/local/a".to_string(),
                destination: "~/bin".to_string(),
            },
            Payload {
                local_path: "/local/b".to_string(),
                destination: "/opt".to_string(),
            },
            Payload {
                local_path: "/local/c".to_string(),
                destination: "/$HOME/bin".to_string(),
            },
        ];

        let jobs = group_payloads(&payloads);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].destination, "/$HOME/bin");
        assert_eq!(jobs[0].local_paths, vec!["/local/a", "/local/c"]);
        assert_eq!(jobs[1].destination, "/opt");
    }
}
