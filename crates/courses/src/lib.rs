//! `lmsops-courses`
//!
//! Seeds the course store from the discovery catalog, granting a given
//! instructor access to every created course.

pub mod catalog;
pub mod command;
pub mod key;
pub mod store;

pub use catalog::{CatalogClient, CatalogError, CourseRun, StaticCatalog};
pub use command::{SyncCourses, SyncError, SyncReport};
pub use key::CourseKey;
pub use store::{Course, CourseStore, CourseStoreError, InMemoryCourseStore, NewCourse};
