//! Spreadsheet import and export.
//!
//! Export writes `class,roll,name,points` rows behind a UTF-8 byte-order mark
//! so spreadsheet programs pick the right encoding. Imports are forgiving:
//! lines that don't fit are skipped.

use crate::errors::AppError;
use crate::models::Student;

const BOM: char = '\u{feff}';

/// One parsed line of a score import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
    pub roll_number: String,
    pub points: i64,
}

/// One parsed line of a roster import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLine {
    pub name: String,
    pub roll_number: String,
}

impl RosterLine {
    pub fn into_student(self, class_group: Option<&str>) -> Student {
        Student::new(&self.name, &self.roll_number, class_group)
    }
}

/// Parse pasted scores. Tokens are split on commas, tabs and whitespace; the
/// last token is the score and the one before it the roll number, so
/// `Name Roll Points` and `Roll Points` both work.
pub fn parse_scores(text: &str) -> Result<Vec<ScoreLine>, AppError> {
    let lines: Vec<ScoreLine> = text.lines().filter_map(parse_score_line).collect();

    if lines.is_empty() {
        return Err(AppError::Validation(
            "No valid student scores found. Check your formatting!".to_string(),
        ));
    }
    Ok(lines)
}

fn parse_score_line(line: &str) -> Option<ScoreLine> {
    let tokens: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let [.., roll, points] = tokens.as_slice() else {
        tracing::debug!("Skipping score line {:?}", line);
        return None;
    };

    match points.parse() {
        Ok(points) => Some(ScoreLine {
            roll_number: roll.to_string(),
            points,
        }),
        Err(_) => {
            tracing::debug!("Skipping score line {:?}: bad points", line);
            None
        }
    }
}

/// Parse a pasted roster of `Name, Roll` lines (comma or tab separated).
pub fn parse_roster(text: &str) -> Vec<RosterLine> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split([',', '\t']).map(str::trim);
            let name = parts.next().filter(|n| !n.is_empty())?;
            let roll = parts.next().filter(|r| !r.is_empty())?;
            Some(RosterLine {
                name: name.to_string(),
                roll_number: roll.to_string(),
            })
        })
        .collect()
}

/// Render the roster as CSV.
pub fn export_csv(students: &[Student]) -> String {
    let rows: Vec<String> = students
        .iter()
        .map(|s| {
            [
                csv_field(s.class_group.as_deref().unwrap_or("")),
                csv_field(&s.roll_number),
                csv_field(&s.name),
                s.points.to_string(),
            ]
            .join(",")
        })
        .collect();

    let mut csv = String::new();
    csv.push(BOM);
    csv.push_str(&rows.join("\n"));
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
