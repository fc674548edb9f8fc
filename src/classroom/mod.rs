//! In-memory classroom state: the roster and its point history.
//!
//! Everything the front end shows is read from here and every edit goes
//! through here. Each change bumps a sequence number on a watch channel so
//! the publisher can tell local edits from documents pulled off the remote
//! store.

use std::cmp::Ordering;
use std::str::FromStr;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::errors::AppError;
use crate::models::{compare_roll_numbers, HistoryLog, Student, SyncDocument};
use crate::transfer::ScoreLine;

/// Reason recorded on entries created by a score import.
pub const BULK_IMPORT_REASON: &str = "Bulk Import";

/// Where a change to the classroom came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Initial contents: restored cache, seeded defaults
    Initial,
    /// An edit made on this device
    Local,
    /// A document applied from the remote store
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeStamp {
    pub seq: u64,
    /// Number of local edits so far. Watchers compare this rather than
    /// `origin`, which only describes the latest change.
    pub local_seq: u64,
    pub origin: ChangeOrigin,
}

/// Result of changing one student's total. The store only knows the new
/// value; callers use the delta for feedback and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointChange {
    pub student_id: String,
    pub old_points: i64,
    pub new_points: i64,
}

impl PointChange {
    /// Saturates at the `i64` bounds.
    pub fn delta(&self) -> i64 {
        self.new_points.saturating_sub(self.old_points)
    }

    pub fn is_gain(&self) -> bool {
        self.delta() > 0
    }
}

/// Roster ordering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterSort {
    /// By roll number, numbers compared by value
    #[default]
    Seat,
    TopScore,
    LowScore,
}

impl FromStr for RosterSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seat" | "id" => Ok(RosterSort::Seat),
            "top" | "score-desc" => Ok(RosterSort::TopScore),
            "low" | "score-asc" => Ok(RosterSort::LowScore),
            other => Err(AppError::Validation(format!("Unknown sort {:?}", other))),
        }
    }
}

impl RosterSort {
    fn compare(&self, a: &Student, b: &Student) -> Ordering {
        match self {
            RosterSort::Seat => compare_roll_numbers(&a.roll_number, &b.roll_number),
            RosterSort::TopScore => b.points.cmp(&a.points),
            RosterSort::LowScore => a.points.cmp(&b.points),
        }
    }
}

/// Roll numbers match ignoring case and surrounding whitespace.
fn same_roll(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

struct State {
    students: Vec<Student>,
    logs: Vec<HistoryLog>,
    seq: u64,
    local_seq: u64,
    last_local_write: Option<Instant>,
}

pub struct Classroom {
    state: Mutex<State>,
    changes: watch::Sender<ChangeStamp>,
}

impl Default for Classroom {
    fn default() -> Self {
        Self::new()
    }
}

impl Classroom {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(ChangeStamp {
            seq: 0,
            local_seq: 0,
            origin: ChangeOrigin::Initial,
        });
        Self {
            state: Mutex::new(State {
                students: Vec::new(),
                logs: Vec::new(),
                seq: 0,
                local_seq: 0,
                last_local_write: None,
            }),
            changes,
        }
    }

    /// Watch for changes. The current stamp counts as already seen.
    pub fn subscribe(&self) -> watch::Receiver<ChangeStamp> {
        self.changes.subscribe()
    }

    fn notify(&self, state: &mut State, origin: ChangeOrigin) {
        state.seq += 1;
        if origin == ChangeOrigin::Local {
            state.local_seq += 1;
            state.last_local_write = Some(Instant::now());
        }
        self.changes.send_replace(ChangeStamp {
            seq: state.seq,
            local_seq: state.local_seq,
            origin,
        });
    }

    /// When this device last edited the classroom.
    pub async fn last_local_write(&self) -> Option<Instant> {
        self.state.lock().await.last_local_write
    }

    // ==================== SNAPSHOTS ====================

    pub async fn snapshot(&self) -> SyncDocument {
        let state = self.state.lock().await;
        SyncDocument::new(state.students.clone(), state.logs.clone())
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.students.is_empty()
    }

    /// Replace both collections wholesale.
    pub async fn replace_all(
        &self,
        students: Vec<Student>,
        logs: Vec<HistoryLog>,
        origin: ChangeOrigin,
    ) {
        let mut state = self.state.lock().await;
        state.students = students;
        state.logs = logs;
        self.notify(&mut state, origin);
    }

    /// Drop every student and every history entry.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.students.clear();
        state.logs.clear();
        self.notify(&mut state, ChangeOrigin::Local);
    }

    // ==================== EDITS ====================

    /// Set a student's total. Returns `None` for an unknown id.
    pub async fn update_points(&self, student_id: &str, new_points: i64) -> Option<PointChange> {
        let mut state = self.state.lock().await;
        let student = state.students.iter_mut().find(|s| s.id == student_id)?;
        let change = PointChange {
            student_id: student.id.clone(),
            old_points: student.points,
            new_points,
        };
        student.points = new_points;
        self.notify(&mut state, ChangeOrigin::Local);
        Some(change)
    }

    /// Add `amount` to a student's total and record it in the history. The
    /// total saturates at the `i64` bounds.
    pub async fn apply_behavior(
        &self,
        student_id: &str,
        amount: i64,
        reason: Option<&str>,
    ) -> Option<(PointChange, HistoryLog)> {
        let mut state = self.state.lock().await;
        let student = state.students.iter_mut().find(|s| s.id == student_id)?;
        let change = PointChange {
            student_id: student.id.clone(),
            old_points: student.points,
            new_points: student.points.saturating_add(amount),
        };
        student.points = change.new_points;
        let entry = HistoryLog::new(student, amount, reason);
        state.logs.insert(0, entry.clone());
        self.notify(&mut state, ChangeOrigin::Local);
        Some((change, entry))
    }

    /// Remove a student. Their history entries stay.
    pub async fn delete_student(&self, student_id: &str) -> Option<Student> {
        let mut state = self.state.lock().await;
        let index = state.students.iter().position(|s| s.id == student_id)?;
        let removed = state.students.remove(index);
        self.notify(&mut state, ChangeOrigin::Local);
        Some(removed)
    }

    pub async fn set_avatar(&self, student_id: &str, avatar_id: u32) -> bool {
        let mut state = self.state.lock().await;
        let Some(student) = state.students.iter_mut().find(|s| s.id == student_id) else {
            return false;
        };
        student.avatar_id = avatar_id;
        self.notify(&mut state, ChangeOrigin::Local);
        true
    }

    pub async fn add_students(&self, students: Vec<Student>) {
        if students.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        state.students.extend(students);
        self.notify(&mut state, ChangeOrigin::Local);
    }

    /// Overwrite totals from imported score lines. Lines match on roll number,
    /// within `class_group` when given, and the first matching line wins.
    /// Every matched student gets one history entry carrying the difference.
    pub async fn import_scores(
        &self,
        lines: &[ScoreLine],
        class_group: Option<&str>,
    ) -> Vec<PointChange> {
        let mut state = self.state.lock().await;
        let mut changes = Vec::new();
        let mut entries = Vec::new();

        for student in state.students.iter_mut() {
            if class_group.is_some_and(|class| !student.in_class(class)) {
                continue;
            }
            let Some(line) = lines
                .iter()
                .find(|line| same_roll(&line.roll_number, &student.roll_number))
            else {
                continue;
            };
            let change = PointChange {
                student_id: student.id.clone(),
                old_points: student.points,
                new_points: line.points,
            };
            student.points = line.points;
            entries.push(HistoryLog::new(
                student,
                change.delta(),
                Some(BULK_IMPORT_REASON),
            ));
            changes.push(change);
        }

        if !changes.is_empty() {
            let older = std::mem::take(&mut state.logs);
            entries.extend(older);
            state.logs = entries;
            self.notify(&mut state, ChangeOrigin::Local);
        }
        changes
    }

    // ==================== QUERIES ====================

    pub async fn students(&self) -> Vec<Student> {
        self.state.lock().await.students.clone()
    }

    #[cfg(test)]
    pub async fn logs(&self) -> Vec<HistoryLog> {
        self.state.lock().await.logs.clone()
    }

    #[cfg(test)]
    pub async fn student(&self, student_id: &str) -> Option<Student> {
        let state = self.state.lock().await;
        state.students.iter().find(|s| s.id == student_id).cloned()
    }

    /// Find a student by roll number within a class.
    pub async fn find_by_roll(&self, class_group: Option<&str>, roll: &str) -> Option<Student> {
        let state = self.state.lock().await;
        state
            .students
            .iter()
            .filter(|s| class_group.is_none_or(|class| s.in_class(class)))
            .find(|s| same_roll(&s.roll_number, roll))
            .cloned()
    }

    /// Class labels in the order they first appear on the roster.
    pub async fn class_groups(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut groups: Vec<String> = Vec::new();
        for class in state.students.iter().filter_map(|s| s.class_group.as_ref()) {
            if !groups.contains(class) {
                groups.push(class.clone());
            }
        }
        groups
    }

    /// Students of one class (or everyone), sorted.
    pub async fn roster(&self, class_group: Option<&str>, sort: RosterSort) -> Vec<Student> {
        let state = self.state.lock().await;
        let mut students: Vec<Student> = state
            .students
            .iter()
            .filter(|s| class_group.is_none_or(|class| s.in_class(class)))
            .cloned()
            .collect();
        students.sort_by(|a, b| sort.compare(a, b));
        students
    }

    pub async fn total_points(&self, class_group: Option<&str>) -> i64 {
        let state = self.state.lock().await;
        state
            .students
            .iter()
            .filter(|s| class_group.is_none_or(|class| s.in_class(class)))
            .map(|s| s.points)
            .sum()
    }

    /// History of a student on the roster, newest first.
    pub async fn history_for(&self, student_id: &str) -> Vec<HistoryLog> {
        let state = self.state.lock().await;
        let Some(student) = state.students.iter().find(|s| s.id == student_id) else {
            return Vec::new();
        };
        state
            .logs
            .iter()
            .filter(|log| log.belongs_to(student))
            .cloned()
            .collect()
    }

    /// History recorded under a name, including entries of deleted students.
    pub async fn history_by_name(&self, name: &str) -> Vec<HistoryLog> {
        let state = self.state.lock().await;
        state
            .logs
            .iter()
            .filter(|log| log.student_name == name)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, roll: &str, points: i64) -> Student {
        let mut student = Student::new(name, roll, Some("Class A"));
        student.points = points;
        student
    }

    async fn classroom(students: Vec<Student>) -> Classroom {
        let classroom = Classroom::new();
        classroom
            .replace_all(students, Vec::new(), ChangeOrigin::Initial)
            .await;
        classroom
    }

    #[tokio::test]
    async fn test_points_sum_deltas() {
        let kim = student("Kim", "1", 0);
        let id = kim.id.clone();
        let classroom = classroom(vec![kim]).await;

        let deltas = [3, -1, 5, -7, 2];
        for delta in deltas {
            let current = classroom.student(&id).await.unwrap().points;
            let change = classroom.update_points(&id, current + delta).await.unwrap();
            assert_eq!(change.delta(), delta);
        }

        assert_eq!(
            classroom.student(&id).await.unwrap().points,
            deltas.iter().sum::<i64>()
        );
    }

    #[tokio::test]
    async fn test_apply_behavior_prepends_log() {
        let kim = student("Kim", "1", 7);
        let id = kim.id.clone();
        let classroom = classroom(vec![kim]).await;
        classroom.apply_behavior(&id, -1, Some("Late to Class")).await;

        let (change, entry) = classroom
            .apply_behavior(&id, 3, Some("Homework Complete"))
            .await
            .unwrap();

        assert_eq!(change.new_points, 9);
        assert!(change.is_gain());
        let logs = classroom.logs().await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0], entry);
        assert_eq!(logs[0].student_name, "Kim");
        assert_eq!(logs[0].amount, 3);
        assert_eq!(logs[0].reason.as_deref(), Some("Homework Complete"));
    }

    #[tokio::test]
    async fn test_delete_keeps_history() {
        let kim = student("Kim", "1", 0);
        let id = kim.id.clone();
        let classroom = classroom(vec![kim, student("Lee", "2", 0)]).await;
        classroom.apply_behavior(&id, 2, None).await;

        let removed = classroom.delete_student(&id).await.unwrap();
        assert_eq!(removed.name, "Kim");
        assert!(classroom.student(&id).await.is_none());
        assert_eq!(classroom.students().await.len(), 1);
        assert_eq!(classroom.history_by_name("Kim").await.len(), 1);
        assert!(classroom.history_for(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let classroom = Classroom::new();
        assert!(classroom.update_points("missing", 3).await.is_none());
        assert!(classroom.apply_behavior("missing", 3, None).await.is_none());
        assert!(!classroom.set_avatar("missing", 3).await);
        assert!(classroom.logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_roster_sorting() {
        let classroom = classroom(vec![
            student("C", "10", 5),
            student("A", "2", 1),
            student("B", "1", 9),
        ])
        .await;

        let seat: Vec<_> = classroom
            .roster(Some("Class A"), RosterSort::Seat)
            .await
            .into_iter()
            .map(|s| s.roll_number)
            .collect();
        assert_eq!(seat, vec!["1", "2", "10"]);

        let top: Vec<_> = classroom
            .roster(None, RosterSort::TopScore)
            .await
            .into_iter()
            .map(|s| s.points)
            .collect();
        assert_eq!(top, vec![9, 5, 1]);
        assert_eq!(classroom.total_points(Some("Class A")).await, 15);
        assert!(classroom.roster(Some("Class B"), RosterSort::Seat).await.is_empty());
    }

    #[tokio::test]
    async fn test_change_origins() {
        let kim = student("Kim", "1", 0);
        let id = kim.id.clone();
        let classroom = classroom(vec![kim]).await;
        let mut changes = classroom.subscribe();
        assert!(classroom.last_local_write().await.is_none());

        classroom.update_points(&id, 1).await;
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().origin, ChangeOrigin::Local);
        assert!(classroom.last_local_write().await.is_some());

        let students = classroom.students().await;
        classroom
            .replace_all(students, Vec::new(), ChangeOrigin::Remote)
            .await;
        assert_eq!(changes.borrow_and_update().origin, ChangeOrigin::Remote);
    }

    #[tokio::test]
    async fn test_import_scores_logs_each_match() {
        let s1 = student("Ann", "S1", 40);
        let s2 = student("Ben", "S2", 0);
        let other = {
            let mut s = Student::new("Cat", "S1", Some("Class B"));
            s.points = 3;
            s
        };
        let classroom = classroom(vec![s1, s2, other]).await;
        let lines = vec![
            ScoreLine {
                roll_number: "S1".into(),
                points: 45,
            },
            ScoreLine {
                roll_number: "S2".into(),
                points: 52,
            },
        ];

        let changes = classroom.import_scores(&lines, Some("Class A")).await;

        assert_eq!(changes.len(), 2);
        let logs = classroom.logs().await;
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.reason.as_deref() == Some(BULK_IMPORT_REASON)));
        assert_eq!(logs[0].student_name, "Ann");
        assert_eq!(logs[0].amount, 5);
        assert_eq!(logs[1].amount, 52);
        let cat = classroom.find_by_roll(Some("Class B"), "S1").await.unwrap();
        assert_eq!(cat.points, 3);
    }

    #[tokio::test]
    async fn test_extreme_points_saturate() {
        let kim = student("Kim", "1", 7);
        let id = kim.id.clone();
        let classroom = classroom(vec![kim]).await;

        let (change, entry) = classroom.apply_behavior(&id, i64::MAX, None).await.unwrap();
        assert_eq!(change.new_points, i64::MAX);
        assert_eq!(change.delta(), i64::MAX - 7);
        assert_eq!(entry.amount, i64::MAX);

        let change = classroom.update_points(&id, i64::MIN).await.unwrap();
        assert_eq!(change.new_points, i64::MIN);
        assert_eq!(change.delta(), i64::MIN);
        assert!(!change.is_gain());
        assert_eq!(classroom.student(&id).await.unwrap().points, i64::MIN);
    }

    #[tokio::test]
    async fn test_import_first_line_wins_and_ignores_case() {
        let classroom = classroom(vec![student("Ann", "s1", 0)]).await;
        let lines = vec![
            ScoreLine {
                roll_number: "S1".into(),
                points: 45,
            },
            ScoreLine {
                roll_number: "S1".into(),
                points: 99,
            },
        ];

        let changes = classroom.import_scores(&lines, None).await;

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_points, 45);
        assert_eq!(classroom.find_by_roll(None, "S1").await.unwrap().points, 45);
        assert_eq!(classroom.logs().await.len(), 1);
    }

    #[test]
    fn test_sort_names() {
        assert_eq!("seat".parse::<RosterSort>().unwrap(), RosterSort::Seat);
        assert_eq!("Score-Desc".parse::<RosterSort>().unwrap(), RosterSort::TopScore);
        assert_eq!("low".parse::<RosterSort>().unwrap(), RosterSort::LowScore);
        assert!(matches!(
            "random".parse::<RosterSort>(),
            Err(AppError::Validation(_))
        ));
    }
}
