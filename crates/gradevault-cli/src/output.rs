//! Formatting shared by the history commands.

use chrono::DateTime;
use gradevault_core::storage::types::SENTINEL_UNKNOWN_GRADE;
use gradevault_core::{CourseOverview, IntegrityReport, VersionIndexEntry};

/// `2024-03-01 12:00 UTC`, or the raw number if out of range.
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn format_grade(grade: i32) -> String {
    if grade == SENTINEL_UNKNOWN_GRADE {
        "n/a".to_string()
    } else {
        grade.to_string()
    }
}

/// "Math 92, Art n/a"
pub fn overview_summary(overview: &[CourseOverview]) -> String {
    overview
        .iter()
        .map(|course| format!("{} {}", course.name, format_grade(course.grade)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn entries_json(entries: &[VersionIndexEntry]) -> serde_json::Value {
    serde_json::Value::Array(
        entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "timestamp": entry.timestamp,
                    "recorded_at": entry.recorded_at(),
                    "course_overview": entry.course_overview,
                })
            })
            .collect(),
    )
}

pub fn integrity_json(report: &IntegrityReport, pruned: usize) -> serde_json::Value {
    serde_json::json!({
        "clean": report.is_clean(),
        "indexed": report.indexed,
        "missing_snapshots": report.missing_snapshots,
        "orphaned_snapshots": report.orphaned_snapshots,
        "pruned": pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00 UTC");
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_unknown_grade_is_na() {
        assert_eq!(format_grade(SENTINEL_UNKNOWN_GRADE), "n/a");
        assert_eq!(format_grade(91), "91");
    }

    #[test]
    fn test_overview_summary() {
        let overview = vec![CourseOverview::new("Math", 92), CourseOverview::new("Art", -100)];
        assert_eq!(overview_summary(&overview), "Math 92, Art n/a");
    }

    #[test]
    fn test_entries_json_shape() {
        let entries = vec![VersionIndexEntry {
            timestamp: 100,
            course_overview: vec![CourseOverview::new("Math", 90)],
        }];
        let value = entries_json(&entries);
        assert_eq!(value[0]["timestamp"], 100);
        assert_eq!(value[0]["course_overview"][0]["name"], "Math");
    }
}
