//! Device-local persistence: the session code and an offline copy of the roster.
//!
//! Nothing here fails. Storage errors are logged and the value is kept in
//! memory for the rest of the process.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::Repository;
use crate::models::{HistoryLog, Student};

pub const SESSION_CODE_KEY: &str = "trainer_code";
pub const STUDENTS_KEY: &str = "pokeclass_students_v1";
pub const LOGS_KEY: &str = "pokeclass_logs_v1";

pub struct Preferences {
    repo: Option<Repository>,
    memory: Mutex<HashMap<String, String>>,
}

impl Preferences {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo: Some(repo),
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Preferences that live only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            repo: None,
            memory: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.memory.lock().await.get(key) {
            return Some(value.clone());
        }
        let repo = self.repo.as_ref()?;
        match repo.get_setting(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not read {} from local storage: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String) {
        if let Some(repo) = &self.repo {
            match repo.set_setting(key, &value).await {
                Ok(()) => {
                    self.memory.lock().await.remove(key);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Could not persist {}, keeping it in memory: {}", key, e);
                }
            }
        }
        self.memory.lock().await.insert(key.to_string(), value);
    }

    pub async fn session_code(&self) -> Option<String> {
        self.get(SESSION_CODE_KEY)
            .await
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
    }

    pub async fn save_session_code(&self, code: &str) {
        self.set(SESSION_CODE_KEY, code.to_string()).await;
    }

    /// The last roster seen on this device, if one was saved and still parses.
    pub async fn load_snapshot(&self) -> Option<(Vec<Student>, Vec<HistoryLog>)> {
        let students = self.get(STUDENTS_KEY).await?;
        let students: Vec<Student> = match serde_json::from_str(&students) {
            Ok(students) => students,
            Err(e) => {
                tracing::warn!("Ignoring corrupt cached roster: {}", e);
                return None;
            }
        };

        let logs = match self.get(LOGS_KEY).await {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt cached history: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Some((students, logs))
    }

    pub async fn save_snapshot(&self, students: &[Student], logs: &[HistoryLog]) {
        match (serde_json::to_string(students), serde_json::to_string(logs)) {
            (Ok(students), Ok(logs)) => {
                self.set(STUDENTS_KEY, students).await;
                self.set(LOGS_KEY, logs).await;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Could not serialize roster for the local cache: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_session_code_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("prefs.sqlite");

        let prefs = Preferences::new(Repository::new(init_database(&db_path).await.unwrap()));
        assert!(prefs.session_code().await.is_none());
        prefs.save_session_code("ABC12345").await;
        drop(prefs);

        let prefs = Preferences::new(Repository::new(init_database(&db_path).await.unwrap()));
        assert_eq!(prefs.session_code().await.as_deref(), Some("ABC12345"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_in_memory() {
        let prefs = Preferences::in_memory();
        assert!(prefs.load_snapshot().await.is_none());

        let kim = Student::new("Kim", "1", None);
        let log = HistoryLog::new(&kim, 2, None);
        prefs.save_snapshot(&[kim.clone()], &[log.clone()]).await;

        let (students, logs) = prefs.load_snapshot().await.unwrap();
        assert_eq!(students, vec![kim]);
        assert_eq!(logs, vec![log]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_ignored() {
        let prefs = Preferences::in_memory();
        prefs.set(STUDENTS_KEY, "{not json".to_string()).await;
        assert!(prefs.load_snapshot().await.is_none());
    }
}
