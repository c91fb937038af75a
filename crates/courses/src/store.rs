//! Course creation boundary.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lmsops_core::UserId;

use crate::key::CourseKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub key: CourseKey,
    pub display_name: String,
    pub instructor: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseKey,
    pub display_name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CourseStoreError {
    #[error("course already exists: {0}")]
    Duplicate(CourseKey),
    #[error("course store error: {0}")]
    Storage(String),
}

pub trait CourseStore: Send + Sync {
    /// Create the course and grant `instructor` course-staff access.
    ///
    /// Keys differing only in case are duplicates.
    fn create_course(&self, course: &NewCourse) -> Result<Course, CourseStoreError>;
}

impl<S: CourseStore + ?Sized> CourseStore for Arc<S> {
    fn create_course(&self, course: &NewCourse) -> Result<Course, CourseStoreError> {
        (**self).create_course(course)
    }
}

/// In-memory course store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCourseStore {
    courses: RwLock<BTreeMap<(String, String, String), Course>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn courses(&self) -> Vec<Course> {
        self.courses
            .read()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl CourseStore for InMemoryCourseStore {
    fn create_course(&self, new: &NewCourse) -> Result<Course, CourseStoreError> {
        let mut courses = self
            .courses
            .write()
            .map_err(|_| CourseStoreError::Storage("lock poisoned".to_string()))?;
        let folded = new.key.folded();
        if courses.contains_key(&folded) {
            return Err(CourseStoreError::Duplicate(new.key.clone()));
        }
        let course = Course {
            id: new.key.clone(),
            display_name: new.display_name.clone(),
            created_by: new.instructor,
            created_at: Utc::now(),
        };
        courses.insert(folded, course.clone());
        Ok(course)
    }
}
