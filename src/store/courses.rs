use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Course, CourseUpdate, NewCourse};
use crate::persist::{PersistedState, StorageScope, Storages};

use super::{Snapshot, local_id, matches_query, same_label};

/// Storage slot of the persisted course list.
pub const COURSE_STORE_KEY: &str = "ecosystia-course-store";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CoursesState {
    courses: Vec<Course>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    pub total: usize,
    pub published: usize,
    pub draft: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// Course catalogue state. Courses live only on the client: new ones get a
/// local id and edits apply directly to the persisted list.
pub struct CourseStore {
    persisted: PersistedState<Snapshot<CoursesState>>,
    loading: bool,
    error: Option<String>,
}

impl CourseStore {
    pub fn new(storages: &Storages) -> Self {
        Self {
            persisted: PersistedState::new(
                COURSE_STORE_KEY,
                Snapshot::default(),
                StorageScope::Local,
                storages,
            ),
            loading: false,
            error: None,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.persisted.get().state.courses
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the list with what `source` yields. On failure the list is
    /// kept and the message recorded.
    pub async fn fetch_courses<F, E>(&mut self, source: F) -> Result<(), E>
    where
        F: Future<Output = Result<Vec<Course>, E>>,
        E: fmt::Display,
    {
        self.loading = true;
        self.error = None;
        let result = source.await;
        self.loading = false;
        match result {
            Ok(courses) => {
                self.persisted.update(|s| s.state.courses = courses);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load courses");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Insert at the front of the list and return the stored course.
    pub fn add_course(&mut self, data: NewCourse) -> Course {
        self.error = None;
        let id = local_id(|id| self.get_course_by_id(id).is_some());
        let course = data.into_course(id);
        let created = course.clone();
        self.persisted.update(|s| s.state.courses.insert(0, course));
        created
    }

    /// Merge `data` into the course with `id`. Unknown ids leave the list
    /// untouched and return `None`.
    pub fn update_course(&mut self, id: &str, data: &CourseUpdate) -> Option<Course> {
        self.error = None;
        self.get_course_by_id(id)?;
        let mut updated = None;
        self.persisted.update(|s| {
            if let Some(course) = s.state.courses.iter_mut().find(|c| c.id == id) {
                course.apply(data);
                updated = Some(course.clone());
            }
        });
        updated
    }

    /// Returns whether a course was removed.
    pub fn delete_course(&mut self, id: &str) -> bool {
        self.error = None;
        if self.get_course_by_id(id).is_none() {
            return false;
        }
        self.persisted.update(|s| s.state.courses.retain(|c| c.id != id));
        true
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn reset(&mut self) {
        self.persisted.set(Snapshot::default());
        self.loading = false;
        self.error = None;
    }

    /// Case-insensitive match on title, description and category.
    pub fn search_courses(&self, query: &str) -> Vec<&Course> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.courses().iter().collect();
        }
        self.courses()
            .iter()
            .filter(|c| {
                matches_query(&c.title, &query)
                    || matches_query(&c.description, &query)
                    || matches_query(&c.category, &query)
            })
            .collect()
    }

    pub fn filter_by_status(&self, status: &str) -> Vec<&Course> {
        self.courses()
            .iter()
            .filter(|c| same_label(&c.status, status))
            .collect()
    }

    pub fn filter_by_category(&self, category: &str) -> Vec<&Course> {
        self.courses()
            .iter()
            .filter(|c| c.category == category)
            .collect()
    }

    pub fn get_course_by_id(&self, id: &str) -> Option<&Course> {
        self.courses().iter().find(|c| c.id == id)
    }

    pub fn stats(&self) -> CourseStats {
        let courses = self.courses();
        let mut by_category = BTreeMap::new();
        for course in courses {
            *by_category.entry(course.category.clone()).or_insert(0) += 1;
        }
        CourseStats {
            total: courses.len(),
            published: courses.iter().filter(|c| same_label(&c.status, "published")).count(),
            draft: courses.iter().filter(|c| same_label(&c.status, "draft")).count(),
            by_category,
        }
    }
}
