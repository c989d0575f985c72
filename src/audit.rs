//! Audit logging for firewall changes
//!
//! Every mutating CLI operation (rule create, update, rename, enable, disable,
//! remove, and profile setting changes) is recorded as one JSON object per
//! line in `audit.log` under the state directory.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    CreateRule,
    UpdateRule,
    RenameRule,
    EnableRule,
    DisableRule,
    RemoveRule,
    UpdateProfileSetting,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub event_type: EventType,

    pub success: bool,

    /// Operation arguments and outcome counts
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log in the state directory.
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let dir = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        Ok(Self::at(dir))
    }

    /// Audit log stored in `dir`.
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            log_path: dir.as_ref().join("audit.log"),
        }
    }

    /// Appends an event as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub fn log(&self, event: &AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        Ok(())
    }

    /// Reads up to `count` of the newest events, newest first.
    ///
    /// Lines that fail to parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read
    pub fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = std::fs::read_to_string(&self.log_path)?;

        Ok(content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .take(count)
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

/// Records an operation outcome. Failures to write are logged, never returned.
pub fn record(
    event_type: EventType,
    success: bool,
    details: serde_json::Value,
    error: Option<String>,
) {
    match AuditLog::new() {
        Ok(audit) => {
            let event = AuditEvent::new(event_type, success, details, error);
            if let Err(e) = audit.log(&event) {
                tracing::warn!("Failed to write audit log: {}", e);
            }
        }
        Err(e) => tracing::warn!("Audit log unavailable: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(
            EventType::UpdateProfileSetting,
            false,
            serde_json::json!({"profiles": "Public"}),
            Some("Access is denied.".to_string()),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("update_profile_setting"));
        assert!(json.contains("Access is denied."));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"timestamp":"2024-01-01T00:00:00Z","event_type":"rename_rule","success":true,"details":{"from":"a","to":"b"},"error":null}"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::RenameRule);
        assert_eq!(event.event_type.to_string(), "rename_rule");
        assert_eq!(event.details["to"], "b");
    }

    #[test]
    fn test_read_recent_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::at(dir.path());
        for name in ["one", "two", "three"] {
            let event = AuditEvent::new(
                EventType::CreateRule,
                true,
                serde_json::json!({ "name": name }),
                None,
            );
            audit.log(&event).unwrap();
        }
        std::fs::OpenOptions::new()
            .append(true)
            .open(audit.path())
            .and_then(|mut f| f.write_all(b"garbage\n"))
            .unwrap();

        let recent = audit.read_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].details["name"], "three");
        assert_eq!(recent[1].details["name"], "two");
    }

    #[test]
    fn test_read_recent_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AuditLog::at(dir.path()).read_recent(5).is_err());
    }
}
