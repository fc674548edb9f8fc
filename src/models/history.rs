//! Point-change history entries.

use serde::{Deserialize, Serialize};

use super::Student;

/// One point change. Entries are never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLog {
    pub id: String,
    /// Name at the time of the change; refreshed from the roster when displayed
    pub student_name: String,
    /// Id of the student. Absent in entries written by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_ref: Option<String>,
    pub amount: i64,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HistoryLog {
    pub fn new(student: &Student, amount: i64, reason: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            student_name: student.name.clone(),
            student_ref: Some(student.id.clone()),
            amount,
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason: reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether this entry was recorded for `student`. Entries without a ref
    /// fall back to matching by name.
    pub fn belongs_to(&self, student: &Student) -> bool {
        match &self.student_ref {
            Some(id) => *id == student.id,
            None => self.student_name == student.name,
        }
    }

    /// Name to show for this entry given the current roster.
    pub fn display_name<'a>(&'a self, roster: &'a [Student]) -> &'a str {
        self.student_ref
            .as_ref()
            .and_then(|id| roster.iter().find(|s| &s.id == id))
            .map(|s| s.name.as_str())
            .unwrap_or(self.student_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_entry_matches_by_name() {
        let kim = Student::new("Kim", "1", None);
        let legacy: HistoryLog = serde_json::from_str(
            r#"{"id":"l1","studentName":"Kim","amount":2,"timestamp":1700000000000}"#,
        )
        .unwrap();
        assert!(legacy.student_ref.is_none());
        assert!(legacy.belongs_to(&kim));
    }

    #[test]
    fn test_display_name_follows_rename() {
        let mut kim = Student::new("Kim", "1", None);
        let entry = HistoryLog::new(&kim, 3, Some("Homework Complete"));
        kim.name = "Kimberly".into();
        assert_eq!(entry.display_name(std::slice::from_ref(&kim)), "Kimberly");
        assert_eq!(entry.display_name(&[]), "Kim");
        assert!(entry.belongs_to(&kim));
    }

    #[test]
    fn test_blank_reason_is_dropped() {
        let kim = Student::new("Kim", "1", None);
        assert!(HistoryLog::new(&kim, 1, Some("  ")).reason.is_none());
    }
}
