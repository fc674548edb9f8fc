//! The document exchanged with the remote store.

use serde::{Deserialize, Serialize};

use super::{HistoryLog, Student};

/// Version tag written on every published document.
pub const SCHEMA_VERSION: &str = "1.2";

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Full snapshot of a classroom. Always published whole, never as a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDocument {
    pub students: Vec<Student>,
    #[serde(default)]
    pub logs: Vec<HistoryLog>,
    #[serde(default = "default_version")]
    pub version: String,
}

impl SyncDocument {
    pub fn new(students: Vec<Student>, logs: Vec<HistoryLog>) -> Self {
        Self {
            students,
            logs,
            version: default_version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_logs_and_version() {
        let doc: SyncDocument = serde_json::from_str(r#"{"students":[]}"#).unwrap();
        assert!(doc.logs.is_empty());
        assert_eq!(doc.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_missing_students_is_rejected() {
        assert!(serde_json::from_str::<SyncDocument>(r#"{"logs":[]}"#).is_err());
    }
}
