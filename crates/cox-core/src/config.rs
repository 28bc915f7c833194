//! Client profile configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coxswain")
}

/// Get the default client profile path
pub fn default_profile_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Per-client startup policy for new conductors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Keep a rolling autopoll of remote process info once framing is up
    #[serde(default = "default_autopoll")]
    pub autopoll: bool,

    /// Launch the framer with VERBOSE=1 for remote-side debug logging
    #[serde(default)]
    pub verbose_framer: bool,

    /// Environment variables sent to every remote shell
    #[serde(default)]
    pub vars_to_send: Vec<(String, String)>,
}

fn default_autopoll() -> bool {
    true
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            autopoll: true,
            verbose_framer: false,
            vars_to_send: Vec::new(),
        }
    }
}

/// Load a client profile from a file
pub fn load_profile(path: &Path) -> Result<ClientProfile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read profile: {}", e)))?;

    let profile = toml::from_str(&content)?;
    Ok(profile)
}

/// Save a client profile to a file
pub fn save_profile(path: &Path, profile: &ClientProfile) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(profile)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write profile: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");

        let profile = ClientProfile {
            autopoll: false,
            verbose_framer: true,
            vars_to_send: vec![("LANG".to_string(), "C.UTF-8".to_string())],
        };

        save_profile(&path, &profile).unwrap();
        let loaded = load_profile(&path).unwrap();

        assert!(!loaded.autopoll);
        assert!(loaded.verbose_framer);
        assert_eq!(loaded.vars_to_send.len(), 1);
    }

    #[test]
    fn test_missing_profile() {
        let result = load_profile(Path::new("/nonexistent/client.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let profile: ClientProfile = toml::from_str("").unwrap();
        assert!(profile.autopoll);
        assert!(!profile.verbose_framer);
    }
}
