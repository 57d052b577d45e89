//! Explicitly constructed state containers, one per domain.
//!
//! A container owns its slice of UI state, exposes read accessors and
//! mutation actions, and persists through [`crate::persist`] on every
//! mutation. Callers pass containers around; there is no global instance.
//!
//! Projects go through the REST backend. Courses and users have no backend
//! endpoints, so their containers mutate the local list directly and take
//! whatever source the caller has when fetching.

pub mod courses;
pub mod projects;
pub mod users;

use serde::{Deserialize, Serialize};

pub use courses::{COURSE_STORE_KEY, CourseStats, CourseStore};
pub use projects::{PROJECT_STORE_KEY, ProjectStats, ProjectStore};
pub use users::{USER_STORE_KEY, UserStats, UserStore};

/// What a container writes to storage: its persisted slice plus a format
/// version. Loading and error flags are never included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot<S> {
    state: S,
    version: u32,
}

/// Status/priority labels differ in case and separators between the
/// backend ("In Progress") and the UI ("in_progress").
fn same_label(a: &str, b: &str) -> bool {
    fn normalise(s: &str) -> String {
        s.trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }
    normalise(a) == normalise(b)
}

/// Case-insensitive substring match of an already lowercased `query`.
fn matches_query(field: &str, query: &str) -> bool {
    field.to_lowercase().contains(query)
}

/// A millisecond timestamp id, bumped past any id already in use.
fn local_id(is_taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = chrono::Utc::now().timestamp_millis();
    while is_taken(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}
