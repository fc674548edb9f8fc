//! Default roster used when a session has no data yet.

use super::Student;

/// A class seeded on first use.
#[derive(Debug, Clone, Copy)]
pub struct PresetClass {
    pub name: &'static str,
    /// Comma-separated student names in seat order
    pub students: &'static str,
}

pub const PRESET_CLASSES: &[PresetClass] = &[PresetClass {
    name: "Class A",
    students: "Ash,Misty,Brock,May,Max,Dawn,Serena,Clemont,Bonnie,Gary,Tracey,Iris",
}];

/// Build the default roster: seat numbers start at 1 in each class, everyone at 0 points.
pub fn default_roster(presets: &[PresetClass]) -> Vec<Student> {
    presets
        .iter()
        .flat_map(|preset| {
            preset
                .students
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .enumerate()
                .map(move |(index, name)| {
                    Student::new(name, &(index + 1).to_string(), Some(preset.name))
                })
        })
        .collect()
}
