//! Eligibility predicate and record selection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::ExpirableRecord;
use crate::repository::{RecordRepository, RepositoryError};

/// Half-open time window `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Which records are due for an action.
///
/// A record matches when its status is eligible and either
/// - it was never actioned and `eligibility_at` falls inside `window`, or
/// - its watermark is at or before `resend_on_or_before`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPredicate {
    pub window: TimeWindow,
    pub resend_on_or_before: DateTime<Utc>,
}

impl EligibilityPredicate {
    /// Predicate for a run on `today` (midnight UTC).
    ///
    /// The window covers the `days_range` days before `today`; records whose
    /// watermark is at least `cooldown_days` old are due again.
    pub fn for_run(today: DateTime<Utc>, days_range: i64, cooldown_days: i64) -> Self {
        Self {
            window: TimeWindow::new(today - Duration::days(days_range), today),
            resend_on_or_before: today - Duration::days(cooldown_days),
        }
    }

    pub fn matches<R: ExpirableRecord>(&self, record: &R) -> bool {
        if !record.has_eligible_status() {
            return false;
        }
        match record.last_action_at() {
            None => record
                .eligibility_at()
                .is_some_and(|at| self.window.contains(at)),
            Some(last) => last <= self.resend_on_or_before,
        }
    }
}

/// Selects eligible records in a deterministic order (owner, then id).
#[derive(Debug, Clone)]
pub struct Selector<R> {
    repository: R,
}

impl<R: RecordRepository> Selector<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn select(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<R::Record>, RepositoryError> {
        let mut records = self.repository.select_eligible(predicate)?;
        records.sort_by_key(|r| (r.owner_id(), r.record_id()));
        debug!(
            window_start = %predicate.window.start,
            window_end = %predicate.window.end,
            matched = records.len(),
            "selected eligible records"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lmsops_core::{RecordId, UserId};

    #[derive(Debug, Clone)]
    struct Row {
        eligible: bool,
        eligibility_at: Option<DateTime<Utc>>,
        last_action_at: Option<DateTime<Utc>>,
    }

    impl ExpirableRecord for Row {
        fn record_id(&self) -> RecordId {
            RecordId::new(1)
        }
        fn owner_id(&self) -> UserId {
            UserId::new(1)
        }
        fn has_eligible_status(&self) -> bool {
            self.eligible
        }
        fn eligibility_at(&self) -> Option<DateTime<Utc>> {
            self.eligibility_at
        }
        fn last_action_at(&self) -> Option<DateTime<Utc>> {
            self.last_action_at
        }
    }

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
    }

    fn row(eligibility_at: Option<DateTime<Utc>>, last_action_at: Option<DateTime<Utc>>) -> Row {
        Row {
            eligible: true,
            eligibility_at,
            last_action_at,
        }
    }

    #[test]
    fn window_bounds_are_half_open() {
        let p = EligibilityPredicate::for_run(today(), 1, 15);
        assert!(p.matches(&row(Some(today() - Duration::days(1)), None)));
        assert!(p.matches(&row(Some(today() - Duration::seconds(1)), None)));
        assert!(!p.matches(&row(Some(today()), None)));
        assert!(!p.matches(&row(Some(today() - Duration::days(1) - Duration::seconds(1)), None)));
    }

    #[test]
    fn watermark_gates_resends() {
        let p = EligibilityPredicate::for_run(today(), 1, 15);
        let old = Some(today() - Duration::days(40));
        assert!(p.matches(&row(old, Some(today() - Duration::days(15)))));
        assert!(!p.matches(&row(old, Some(today() - Duration::days(14)))));
    }

    #[test]
    fn a_watermarked_record_ignores_the_window() {
        let p = EligibilityPredicate::for_run(today(), 1, 15);
        let in_window = Some(today() - Duration::hours(3));
        assert!(!p.matches(&row(in_window, Some(today()))));
    }

    #[test]
    fn ineligible_status_never_matches() {
        let p = EligibilityPredicate::for_run(today(), 1, 15);
        let mut r = row(Some(today() - Duration::hours(3)), None);
        r.eligible = false;
        assert!(!p.matches(&r));
    }

    #[test]
    fn missing_eligibility_date_never_matches_first_time() {
        let p = EligibilityPredicate::for_run(today(), 1, 15);
        assert!(!p.matches(&row(None, None)));
    }
}
