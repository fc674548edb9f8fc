//! Preset classroom behaviors and their point values.

/// A named behavior the teacher can award or deduct points for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Behavior {
    pub label: &'static str,
    pub label_zh: &'static str,
    pub points: i64,
}

const fn behavior(label: &'static str, label_zh: &'static str, points: i64) -> Behavior {
    Behavior {
        label,
        label_zh,
        points,
    }
}

pub const POSITIVE_BEHAVIORS: &[Behavior] = &[
    behavior("Active Participation", "積極參與", 1),
    behavior("Homework Complete", "作業完成", 2),
    behavior("Helped a Friend", "幫助同學", 3),
    behavior("Creative Thinking", "創意思考", 2),
    behavior("Perfect Attendance", "全勤表現", 5),
    behavior("Good Manners", "有禮貌", 1),
    behavior("Clean Desk", "桌面整潔", 1),
    behavior("Teamwork", "團隊合作", 2),
    behavior("Speaking English", "說英文", 2),
];

pub const NEGATIVE_BEHAVIORS: &[Behavior] = &[
    behavior("Distracting Others", "干擾他人", -2),
    behavior("Forgot Homework", "忘記作業", -2),
    behavior("Late to Class", "上課遲到", -1),
    behavior("Disruptive", "搗亂秩序", -3),
    behavior("No Supplies", "沒帶用品", -1),
    behavior("Sleeping", "上課睡覺", -2),
    behavior("Eating in Class", "偷吃東西", -1),
];

/// Look a behavior up by its English or Chinese label, ignoring case.
pub fn find_behavior(label: &str) -> Option<Behavior> {
    let label = label.trim();
    POSITIVE_BEHAVIORS
        .iter()
        .chain(NEGATIVE_BEHAVIORS)
        .find(|b| b.label.eq_ignore_ascii_case(label) || b.label_zh == label)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_behavior() {
        assert_eq!(find_behavior("homework complete").map(|b| b.points), Some(2));
        assert_eq!(find_behavior("上課遲到").map(|b| b.points), Some(-1));
        assert!(find_behavior("Flying").is_none());
    }

    #[test]
    fn test_signs() {
        assert!(POSITIVE_BEHAVIORS.iter().all(|b| b.points > 0));
        assert!(NEGATIVE_BEHAVIORS.iter().all(|b| b.points < 0));
    }
}
