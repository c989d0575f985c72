use crate::core::alias::PROFILES;
use crate::core::error::{Error, Result};
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

const CONFIG_FILE: &str = "config.json";

/// Persisted CLI preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Print JSON instead of tables for read commands
    #[serde(default)]
    pub json_output: bool,
    /// Profile set applied by `add` when `--profiles` is omitted
    #[serde(default = "default_profiles")]
    pub default_profiles: String,
    #[serde(default = "default_true")]
    pub enable_audit_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            json_output: false,
            default_profiles: default_profiles(),
            enable_audit_log: true,
        }
    }
}

impl AppConfig {
    /// Setting names accepted by [`AppConfig::set`]
    pub const KEYS: [&'static str; 3] = ["json_output", "default_profiles", "enable_audit_log"];

    /// Updates one setting from its text form.
    ///
    /// `default_profiles` is validated against the profile aliases and stored
    /// in canonical form.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown key or a non-boolean flag value;
    /// `UnrecognizedAlias` for an invalid profile set.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "json_output" => self.json_output = parse_flag(key, value)?,
            "enable_audit_log" => self.enable_audit_log = parse_flag(key, value)?,
            "default_profiles" => self.default_profiles = PROFILES.canonicalize(value)?,
            _ => {
                return Err(Error::validation(
                    key,
                    format!("unknown setting, expected one of: {}", Self::KEYS.join(", ")),
                ));
            }
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    value
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| Error::validation(key, format!("expected true or false, got '{value}'")))
}

fn default_profiles() -> String {
    "Any".to_string()
}

fn default_true() -> bool {
    true
}

/// Saves the config atomically: written to a temp file in the target
/// directory, flushed, then persisted over `config.json`.
///
/// # Security
///
/// On Unix the temp file is created with mode 0o600 by `tempfile`.
/// On Windows the file inherits the ACLs of the data directory.
pub fn save_config(config: &AppConfig) -> std::io::Result<()> {
    match get_data_dir() {
        Some(dir) => save_config_to(config, &dir),
        None => Ok(()),
    }
}

pub fn save_config_to(config: &AppConfig, dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(config)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(json.as_bytes())?;
    file.as_file().sync_all()?;

    file.persist(dir.join(CONFIG_FILE)).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e.error
        }
    })?;
    Ok(())
}

/// Loads the config, or returns defaults if it is missing or unreadable.
pub fn load_config() -> AppConfig {
    get_data_dir()
        .map(|dir| load_config_from(&dir))
        .unwrap_or_default()
}

pub fn load_config_from(dir: &Path) -> AppConfig {
    let path = dir.join(CONFIG_FILE);
    match std::fs::read_to_string(&path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}
