//! Verification persistence and enrollment lookups.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use lmsops_batch::{EligibilityPredicate, RecordRepository, RepositoryError};
use lmsops_core::{RecordId, UserId, VerificationId};

use crate::verification::PhotoVerification;

/// Keep only the most recently updated verification of each user.
///
/// Ties on `updated_at` resolve to the highest id.
pub fn most_recent_per_user(records: Vec<PhotoVerification>) -> Vec<PhotoVerification> {
    let mut latest: BTreeMap<UserId, PhotoVerification> = BTreeMap::new();
    for record in records {
        match latest.get(&record.user_id) {
            Some(current) if (current.updated_at, current.id) >= (record.updated_at, record.id) => {}
            _ => {
                latest.insert(record.user_id, record);
            }
        }
    }
    latest.into_values().collect()
}

/// In-memory verification store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryVerificationStore {
    rows: RwLock<BTreeMap<VerificationId, PhotoVerification>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, verification: PhotoVerification) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(verification.id, verification);
        }
    }

    pub fn get(&self, id: VerificationId) -> Option<PhotoVerification> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    fn lock_err() -> RepositoryError {
        RepositoryError::Storage("verification store lock poisoned".to_string())
    }
}

impl RecordRepository for InMemoryVerificationStore {
    type Record = PhotoVerification;

    fn select_eligible(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<PhotoVerification>, RepositoryError> {
        let rows = self.rows.read().map_err(|_| Self::lock_err())?;
        let matching = rows
            .values()
            .filter(|v| predicate.matches(*v))
            .cloned()
            .collect();
        Ok(most_recent_per_user(matching))
    }

    fn update_watermark(
        &self,
        id: RecordId,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().map_err(|_| Self::lock_err())?;
        let row = rows
            .get_mut(&VerificationId::new(id.get()))
            .ok_or(RepositoryError::NotFound(id))?;
        row.expiry_email_date = watermark;
        Ok(())
    }
}

/// Whether a learner holds an enrollment that keeps reminders going.
pub trait EnrollmentLookup: Send + Sync {
    fn has_verified_enrollment(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}

impl<E: EnrollmentLookup + ?Sized> EnrollmentLookup for Arc<E> {
    fn has_verified_enrollment(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        (**self).has_verified_enrollment(user_id)
    }
}

/// In-memory enrollment modes for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryEnrollments {
    verified: RwLock<BTreeSet<UserId>>,
}

impl InMemoryEnrollments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll_verified(&self, user_id: UserId) {
        if let Ok(mut verified) = self.verified.write() {
            verified.insert(user_id);
        }
    }
}

impl EnrollmentLookup for InMemoryEnrollments {
    fn has_verified_enrollment(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.verified
            .read()
            .map(|v| v.contains(&user_id))
            .map_err(|_| RepositoryError::Storage("enrollment lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap()
    }

    fn predicate() -> EligibilityPredicate {
        EligibilityPredicate::for_run(today(), 1, 15)
    }

    #[test]
    fn selects_only_the_latest_matching_attempt_per_user() {
        let store = InMemoryVerificationStore::new();
        let expiry = today() - Duration::hours(12);
        store.insert(PhotoVerification::approved(
            VerificationId::new(1),
            UserId::new(5),
            expiry,
            today() - Duration::days(400),
        ));
        store.insert(PhotoVerification::approved(
            VerificationId::new(2),
            UserId::new(5),
            expiry,
            today() - Duration::days(300),
        ));
        store.insert(PhotoVerification::approved(
            VerificationId::new(3),
            UserId::new(6),
            expiry,
            today() - Duration::days(300),
        ));

        let ids: Vec<_> = store
            .select_eligible(&predicate())
            .unwrap()
            .into_iter()
            .map(|v| v.id.get())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn superseded_attempts_are_not_selected() {
        let store = InMemoryVerificationStore::new();
        let mut outdated = PhotoVerification::new(VerificationId::new(1), UserId::new(5), today());
        outdated.status = crate::VerificationStatus::Approved;
        store.insert(outdated);

        assert!(store.select_eligible(&predicate()).unwrap().is_empty());
    }

    #[test]
    fn watermark_updates_unknown_row_fail() {
        let store = InMemoryVerificationStore::new();
        let err = store.update_watermark(RecordId::new(9), Some(today())).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn enrollment_lookup_reports_verified_learners() {
        let enrollments = InMemoryEnrollments::new();
        enrollments.enroll_verified(UserId::new(3));
        assert!(enrollments.has_verified_enrollment(UserId::new(3)).unwrap());
        assert!(!enrollments.has_verified_enrollment(UserId::new(4)).unwrap());
    }
}
