//! Encrypted per-user history storage.

pub mod encryption;
pub mod file_store;
pub mod traits;
pub mod types;

pub use file_store::HistoryStore;
pub use traits::HistoryEngine;
pub use types::{
    Assignment, Course, CourseOverview, GradebookSnapshot, IntegrityReport, Snapshot,
    VersionIndexEntry,
};
