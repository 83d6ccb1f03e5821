//! Core data types for the history store.
//!
//! Changing the serialized shape of [`GradebookSnapshot`] invalidates
//! previously stored history, since snapshots are persisted as JSON.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Placeholder for a string field the upstream record did not provide.
pub const SENTINEL_UNKNOWN_STR: &str = "UNKNOWN";

/// Placeholder for a grade the upstream record did not provide.
pub const SENTINEL_UNKNOWN_GRADE: i32 = -100;

fn unknown_str() -> String {
    SENTINEL_UNKNOWN_STR.to_string()
}

fn unknown_grade() -> i32 {
    SENTINEL_UNKNOWN_GRADE
}

/// A record the history store can persist.
///
/// The store treats snapshots as opaque apart from these two accessors,
/// which feed the version index.
pub trait Snapshot: Serialize + DeserializeOwned {
    /// Unix timestamp (seconds) identifying this snapshot.
    fn timestamp(&self) -> i64;

    /// Compact per-course summary stored in the index.
    fn course_overview(&self) -> Vec<CourseOverview>;
}

/// A gradebook at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradebookSnapshot {
    /// When the record was fetched (unix seconds)
    pub last_updated: i64,

    #[serde(default)]
    pub courses: Vec<Course>,
}

/// One course in a gradebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course name with the upstream course ID removed
    #[serde(default = "unknown_str")]
    pub name: String,

    #[serde(default = "unknown_grade")]
    pub grade: i32,

    #[serde(default = "unknown_str")]
    pub teacher: String,

    #[serde(default)]
    pub period: i32,

    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// One graded assignment within a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default = "unknown_str")]
    pub name: String,

    /// mm/dd/yyyy as reported upstream
    #[serde(default = "unknown_str")]
    pub assigned_date: String,

    /// mm/dd/yyyy as reported upstream
    #[serde(default = "unknown_str")]
    pub due_date: String,

    /// Assignment category (no weighting information is available)
    #[serde(rename = "type", default = "unknown_str")]
    pub kind: String,

    #[serde(default = "unknown_grade")]
    pub grade: i32,

    /// e.g. "0.39 / 1.0000"
    #[serde(default = "unknown_str")]
    pub points: String,
}

/// Course name and grade, as kept in the version index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOverview {
    pub name: String,
    pub grade: i32,
}

impl CourseOverview {
    pub fn new(name: impl Into<String>, grade: i32) -> Self {
        Self {
            name: name.into(),
            grade,
        }
    }
}

/// One entry of a user's version index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndexEntry {
    /// Snapshot timestamp (unix seconds), unique within a history
    pub timestamp: i64,

    pub course_overview: Vec<CourseOverview>,
}

impl VersionIndexEntry {
    /// Build the index entry for a snapshot.
    pub fn for_snapshot<S: Snapshot>(snapshot: &S) -> Self {
        Self {
            timestamp: snapshot.timestamp(),
            course_overview: snapshot.course_overview(),
        }
    }

    /// The timestamp as a UTC datetime, if representable.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

impl GradebookSnapshot {
    pub fn new(last_updated: i64, courses: Vec<Course>) -> Self {
        Self {
            last_updated,
            courses,
        }
    }
}

impl Snapshot for GradebookSnapshot {
    fn timestamp(&self) -> i64 {
        self.last_updated
    }

    fn course_overview(&self) -> Vec<CourseOverview> {
        self.courses
            .iter()
            .map(|course| CourseOverview::new(course.name.clone(), course.grade))
            .collect()
    }
}

impl Course {
    /// A course with no assignments, as seen at the start of a term.
    pub fn new(name: impl Into<String>, grade: i32) -> Self {
        Self {
            name: name.into(),
            grade,
            teacher: unknown_str(),
            period: 0,
            assignments: Vec::new(),
        }
    }

    pub fn with_teacher(mut self, teacher: impl Into<String>) -> Self {
        self.teacher = teacher.into();
        self
    }

    pub fn with_period(mut self, period: i32) -> Self {
        self.period = period;
        self
    }

    pub fn with_assignments(mut self, assignments: Vec<Assignment>) -> Self {
        self.assignments = assignments;
        self
    }
}

/// Result of comparing a history's index against its snapshot files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Index entries whose snapshot file is missing
    pub missing_snapshots: Vec<i64>,

    /// Snapshot files not referenced by the index
    pub orphaned_snapshots: Vec<i64>,

    /// Number of entries in the index
    pub indexed: usize,
}

impl IntegrityReport {
    /// True when index and snapshot files agree exactly.
    pub fn is_clean(&self) -> bool {
        self.missing_snapshots.is_empty() && self.orphaned_snapshots.is_empty()
    }
}
