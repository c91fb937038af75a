//! Persistence boundary for expirable records.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use lmsops_core::RecordId;

use crate::record::ExpirableRecord;
use crate::selector::EligibilityPredicate;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Record store consumed by the selector and the watermark writer.
pub trait RecordRepository: Send + Sync {
    type Record: ExpirableRecord;

    /// Records matching `predicate`. Ordering is left to the caller.
    fn select_eligible(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<Self::Record>, RepositoryError>;

    /// Set (or clear) the watermark of a single record. Last write wins.
    fn update_watermark(
        &self,
        id: RecordId,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;
}

impl<R: RecordRepository + ?Sized> RecordRepository for Arc<R> {
    type Record = R::Record;

    fn select_eligible(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<Self::Record>, RepositoryError> {
        (**self).select_eligible(predicate)
    }

    fn update_watermark(
        &self,
        id: RecordId,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        (**self).update_watermark(id, watermark)
    }
}

impl<R: RecordRepository + ?Sized> RecordRepository for &R {
    type Record = R::Record;

    fn select_eligible(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<Self::Record>, RepositoryError> {
        (**self).select_eligible(predicate)
    }

    fn update_watermark(
        &self,
        id: RecordId,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        (**self).update_watermark(id, watermark)
    }
}
