//! Student model matching the shared document's Student entries.

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of avatars in the artwork catalog.
pub const TOTAL_AVATARS: u32 = 500;

/// Official artwork for an avatar id.
pub fn avatar_image_url(avatar_id: u32) -> String {
    format!(
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork/{}.png",
        avatar_id
    )
}

/// Pick a random avatar from the catalog.
pub fn random_avatar() -> u32 {
    rand::rng().random_range(1..=TOTAL_AVATARS)
}

/// A student on the class roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    /// School-assigned roll number. Serialized as `studentId` for compatibility
    /// with documents written by the web client.
    #[serde(rename = "studentId")]
    pub roll_number: String,
    pub points: i64,
    pub avatar_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_group: Option<String>,
}

impl Student {
    /// Create a student with a fresh id, zero points and a random avatar.
    pub fn new(name: &str, roll_number: &str, class_group: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            roll_number: roll_number.trim().to_string(),
            points: 0,
            avatar_id: random_avatar(),
            class_group: class_group.map(str::to_string),
        }
    }

    pub fn in_class(&self, class_group: &str) -> bool {
        self.class_group.as_deref() == Some(class_group)
    }
}

/// Compare roll numbers the way people sort seat numbers: runs of digits
/// compare by value, everything else case-insensitively. "2" < "10", "A9" < "A10".
pub fn compare_roll_numbers(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l, r) {
                    (Chunk::Digits(l), Chunk::Digits(r)) => compare_digits(l, r),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(l), Chunk::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_aware_ordering() {
        let mut rolls = vec!["10", "2", "1", "A10", "A9", "b1", "02"];
        rolls.sort_by(|a, b| compare_roll_numbers(a, b));
        assert_eq!(rolls, vec!["1", "02", "2", "10", "A9", "A10", "b1"]);
    }

    #[test]
    fn test_wire_field_names() {
        let student = Student {
            id: "s-1".into(),
            name: "Kim".into(),
            roll_number: "7".into(),
            points: 7,
            avatar_id: 25,
            class_group: Some("Class A".into()),
        };
        let json = serde_json::to_value(&student).unwrap();
        assert_eq!(json["studentId"], "7");
        assert_eq!(json["avatarId"], 25);
        assert_eq!(json["classGroup"], "Class A");
    }

    #[test]
    fn test_new_student_defaults() {
        let student = Student::new(" Misty ", "2", None);
        assert_eq!(student.name, "Misty");
        assert_eq!(student.points, 0);
        assert!((1..=TOTAL_AVATARS).contains(&student.avatar_id));
        assert!(student.class_group.is_none());
    }
}
