//! Course runs published by the discovery catalog.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRun {
    /// Course key as published; parsed by the sync command.
    pub key: String,
    #[serde(default)]
    pub title: String,
}

impl CourseRun {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

pub trait CatalogClient: Send + Sync {
    fn course_runs(&self) -> Result<Vec<CourseRun>, CatalogError>;
}

impl<C: CatalogClient + ?Sized> CatalogClient for std::sync::Arc<C> {
    fn course_runs(&self) -> Result<Vec<CourseRun>, CatalogError> {
        (**self).course_runs()
    }
}

/// Fixed list of runs, for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    runs: Vec<CourseRun>,
}

impl StaticCatalog {
    pub fn new(runs: Vec<CourseRun>) -> Self {
        Self { runs }
    }
}

impl CatalogClient for StaticCatalog {
    fn course_runs(&self) -> Result<Vec<CourseRun>, CatalogError> {
        Ok(self.runs.clone())
    }
}
