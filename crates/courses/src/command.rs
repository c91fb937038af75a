//! `sync-courses`: create every catalog course run in the course store.

use serde::Serialize;
use tracing::{info, warn};

use lmsops_core::{DirectoryError, DomainError, UserDirectory, user_from_str};

use crate::catalog::{CatalogClient, CatalogError};
use crate::key::CourseKey;
use crate::store::{CourseStore, CourseStoreError, NewCourse};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Instructor(#[from] DirectoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid course key {key:?}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: DomainError,
    },
    #[error("failed to create {key}: {reason}")]
    Store { key: CourseKey, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: Vec<CourseKey>,
    pub skipped: Vec<CourseKey>,
}

/// Populates the course store from the catalog. Used to seed integration
/// environments, e.g. `lmsops sync-courses staff@example.com`.
#[derive(Debug, Clone)]
pub struct SyncCourses<D, K, S> {
    directory: D,
    catalog: K,
    store: S,
}

impl<D, K, S> SyncCourses<D, K, S>
where
    D: UserDirectory,
    K: CatalogClient,
    S: CourseStore,
{
    pub fn new(directory: D, catalog: K, store: S) -> Self {
        Self {
            directory,
            catalog,
            store,
        }
    }

    /// Nothing is created unless the instructor resolves and every key parses.
    pub fn run(&self, instructor: &str) -> Result<SyncReport, SyncError> {
        let instructor = user_from_str(&self.directory, instructor)?;

        let planned = self
            .catalog
            .course_runs()?
            .into_iter()
            .map(|run| {
                let key = run.key.parse::<CourseKey>().map_err(|source| SyncError::InvalidKey {
                    key: run.key.clone(),
                    source,
                })?;
                Ok(NewCourse {
                    key,
                    display_name: run.title,
                    instructor: instructor.id,
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;

        let mut report = SyncReport::default();
        for course in planned {
            match self.store.create_course(&course) {
                Ok(created) => {
                    info!("Created {}", created.id);
                    report.created.push(created.id);
                }
                Err(CourseStoreError::Duplicate(key)) => {
                    warn!(
                        "Course already exists for {}, {}, {}. Skipping",
                        key.org, key.course, key.run
                    );
                    report.skipped.push(key);
                }
                Err(CourseStoreError::Storage(reason)) => {
                    return Err(SyncError::Store {
                        key: course.key,
                        reason,
                    });
                }
            }
        }
        Ok(report)
    }
}
