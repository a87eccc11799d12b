//! Configuration for the file-analysis layer.

use chrono::Duration;
use filescope_core::{FilesError, Result, DEFAULT_SALT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings shared by the orchestration layer, the reference engine and
/// upstream protocol logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Salt mixed into every file handle before hashing.
    ///
    /// The default is public knowledge; override it in production.
    #[serde(default = "default_salt")]
    pub salt: String,

    /// Inactivity timeout applied to new files (seconds).
    #[serde(default = "default_timeout_interval")]
    pub default_timeout_interval_secs: u64,

    /// Networks considered local (CIDR notation).
    #[serde(default)]
    pub local_nets: Vec<String>,

    /// Where the files log is written (stdout when unset).
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Protocols whose file analysis is skipped entirely.
    ///
    /// Consulted by protocol logic, not by the lifecycle handlers.
    #[serde(default)]
    pub disable: BTreeMap<String, bool>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            salt: default_salt(),
            default_timeout_interval_secs: default_timeout_interval(),
            local_nets: Vec::new(),
            log_path: None,
            disable: BTreeMap::new(),
        }
    }
}

impl FilesConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| FilesError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FilesError::Config(e.to_string()))
    }

    /// Whether analysis is disabled for a protocol
    #[must_use]
    pub fn is_disabled(&self, protocol: &str) -> bool {
        self.disable.get(protocol).copied().unwrap_or(false)
    }

    /// Default inactivity timeout
    #[must_use]
    pub fn default_timeout_interval(&self) -> Duration {
        let secs = u32::try_from(self.default_timeout_interval_secs).unwrap_or(u32::MAX);
        Duration::seconds(i64::from(secs))
    }

    /// Whether the salt is still the shipped default
    #[must_use]
    pub fn uses_default_salt(&self) -> bool {
        self.salt == DEFAULT_SALT
    }
}

// Default value functions for serde.
fn default_salt() -> String {
    String::from(DEFAULT_SALT)
}

const fn default_timeout_interval() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FilesConfig::default();
        assert!(config.uses_default_salt());
        assert_eq!(config.default_timeout_interval(), Duration::minutes(2));
        assert!(config.local_nets.is_empty());
        assert!(!config.is_disabled("HTTP"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = FilesConfig::load(Path::new("/tmp/nonexistent_filescope_test.toml")).unwrap();
        assert_eq!(config, FilesConfig::default());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            r#"
salt = "site-specific"
local_nets = ["10.0.0.0/8"]

[disable]
SMTP = true
HTTP = false
"#
        )
        .unwrap();

        let config = FilesConfig::load(tmpfile.path()).unwrap();
        assert_eq!(config.salt, "site-specific");
        assert!(!config.uses_default_salt());
        assert!(config.is_disabled("SMTP"));
        assert!(!config.is_disabled("HTTP"));
        // Unset fields fall back to defaults.
        assert_eq!(config.default_timeout_interval_secs, 120);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "salt = [").unwrap();
        let err = FilesConfig::load(tmpfile.path()).unwrap_err();
        assert!(matches!(err, FilesError::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = FilesConfig::default();
        config.disable.insert("FTP_DATA".into(), true);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: FilesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let toml_text = config.to_toml().unwrap();
        assert!(toml_text.contains("FTP_DATA"));
    }
}
