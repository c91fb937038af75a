//! Entitlement persistence boundary.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use lmsops_batch::{BatchRange, RepositoryError};
use lmsops_core::{CourseEntitlementId, RecordId};

use crate::entitlement::CourseEntitlement;

pub trait EntitlementRepository: Send + Sync {
    /// Highest id in use, if any rows exist.
    fn max_id(&self) -> Result<Option<CourseEntitlementId>, RepositoryError>;

    /// Unexpired entitlements with `range.start <= id < range.end`, by id.
    fn unexpired_in_range(&self, range: BatchRange) -> Result<Vec<CourseEntitlement>, RepositoryError>;

    /// Set `expired_at` unless already set. Returns whether the row changed.
    fn mark_expired(&self, id: CourseEntitlementId, at: DateTime<Utc>) -> Result<bool, RepositoryError>;
}

impl<R: EntitlementRepository + ?Sized> EntitlementRepository for Arc<R> {
    fn max_id(&self) -> Result<Option<CourseEntitlementId>, RepositoryError> {
        (**self).max_id()
    }

    fn unexpired_in_range(&self, range: BatchRange) -> Result<Vec<CourseEntitlement>, RepositoryError> {
        (**self).unexpired_in_range(range)
    }

    fn mark_expired(&self, id: CourseEntitlementId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        (**self).mark_expired(id, at)
    }
}

/// In-memory entitlement store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryEntitlementStore {
    rows: RwLock<BTreeMap<CourseEntitlementId, CourseEntitlement>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, entitlement: CourseEntitlement) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(entitlement.id, entitlement);
        }
    }

    pub fn get(&self, id: CourseEntitlementId) -> Option<CourseEntitlement> {
        self.rows.read().ok()?.get(&id).cloned()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("entitlement store lock poisoned".to_string())
}

impl EntitlementRepository for InMemoryEntitlementStore {
    fn max_id(&self) -> Result<Option<CourseEntitlementId>, RepositoryError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.keys().next_back().copied())
    }

    fn unexpired_in_range(&self, range: BatchRange) -> Result<Vec<CourseEntitlement>, RepositoryError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let start = CourseEntitlementId::new(range.start);
        let end = CourseEntitlementId::new(range.end);
        Ok(rows
            .range(start..end)
            .map(|(_, e)| e)
            .filter(|e| !e.is_expired())
            .cloned()
            .collect())
    }

    fn mark_expired(&self, id: CourseEntitlementId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(RecordId::from(id)))?;
        if row.expired_at.is_some() {
            return Ok(false);
        }
        row.expired_at = Some(at);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lmsops_core::UserId;

    fn entitlement(id: i64) -> CourseEntitlement {
        CourseEntitlement::new(
            CourseEntitlementId::new(id),
            UserId::new(id),
            "course",
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn range_is_half_open_and_skips_expired() {
        let store = InMemoryEntitlementStore::new();
        for id in 1..=5 {
            store.insert(entitlement(id));
        }
        store.mark_expired(CourseEntitlementId::new(2), Utc::now()).unwrap();

        let ids: Vec<i64> = store
            .unexpired_in_range(BatchRange::new(1, 4))
            .unwrap()
            .iter()
            .map(|e| e.id.get())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn mark_expired_is_idempotent() {
        let store = InMemoryEntitlementStore::new();
        store.insert(entitlement(1));
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(store.mark_expired(CourseEntitlementId::new(1), first).unwrap());
        assert!(!store.mark_expired(CourseEntitlementId::new(1), Utc::now()).unwrap());
        assert_eq!(store.get(CourseEntitlementId::new(1)).unwrap().expired_at, Some(first));
    }

    #[test]
    fn max_id_tracks_gaps() {
        let store = InMemoryEntitlementStore::new();
        assert_eq!(store.max_id().unwrap(), None);
        store.insert(entitlement(3));
        store.insert(entitlement(9));
        assert_eq!(store.max_id().unwrap(), Some(CourseEntitlementId::new(9)));
    }
}
