//! Catalog client reading an exported discovery response.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use lmsops_courses::{CatalogClient, CatalogError, CourseRun};

/// Reads course runs from a JSON file: either a bare array or a paginated
/// `{"results": [...]}` page as returned by the discovery API.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Runs(Vec<CourseRun>),
    Page { results: Vec<CourseRun> },
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogClient for JsonFileCatalog {
    fn course_runs(&self) -> Result<Vec<CourseRun>, CatalogError> {
        let data = std::fs::read(&self.path)
            .map_err(|e| CatalogError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let document: CatalogDocument = serde_json::from_slice(&data)
            .map_err(|e| CatalogError::Malformed(format!("{}: {e}", self.path.display())))?;
        Ok(match document {
            CatalogDocument::Runs(runs) => runs,
            CatalogDocument::Page { results } => results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_bare_array() {
        let (_dir, path) = write(r#"[{"key": "course-v1:edX+DemoX+T1", "title": "Demo"}]"#);
        let runs = JsonFileCatalog::new(path).course_runs().unwrap();
        assert_eq!(runs, vec![CourseRun::new("course-v1:edX+DemoX+T1", "Demo")]);
    }

    #[test]
    fn reads_paginated_page() {
        let (_dir, path) = write(
            r#"{"count": 1, "next": null, "results": [{"key": "course-v1:edX+DemoX+T1", "title": "Demo", "pacing_type": "self_paced"}]}"#,
        );
        let runs = JsonFileCatalog::new(path).course_runs().unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileCatalog::new(dir.path().join("nope.json"))
            .course_runs()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        let (_dir, path) = write("{\"runs\": 3}");
        assert!(matches!(
            JsonFileCatalog::new(path).course_runs(),
            Err(CatalogError::Malformed(_))
        ));
    }
}
