//! Course entitlements and the policy that expires them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lmsops_core::{CourseEntitlementId, UserId, floor_days};

/// The course run an entitlement was redeemed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementEnrollment {
    pub course_run_key: String,
    pub enrolled_at: DateTime<Utc>,
    pub course_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntitlement {
    pub id: CourseEntitlementId,
    pub user_id: UserId,
    pub course_uuid: String,
    pub mode: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
    pub enrollment: Option<EntitlementEnrollment>,
}

impl CourseEntitlement {
    pub fn new(
        id: CourseEntitlementId,
        user_id: UserId,
        course_uuid: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            course_uuid: course_uuid.into(),
            mode: "verified".to_string(),
            created_at,
            expired_at: None,
            enrollment: None,
        }
    }

    pub fn with_enrollment(mut self, enrollment: EntitlementEnrollment) -> Self {
        self.enrollment = Some(enrollment);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expired_at.is_some()
    }
}

/// When an unused or barely-used entitlement lapses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationPolicy {
    /// Lifetime of an entitlement from purchase.
    pub expiration_period_days: i64,
    /// Window after enrolling during which the learner may switch runs.
    pub regain_period_days: i64,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            expiration_period_days: 730,
            regain_period_days: 14,
        }
    }
}

impl ExpirationPolicy {
    /// Whole days left before `entitlement` expires; negative once past.
    ///
    /// For redeemed entitlements the regain window counts from the most recent
    /// of course start, enrollment and purchase, and the earlier deadline wins.
    pub fn days_until_expiration(&self, entitlement: &CourseEntitlement, now: DateTime<Utc>) -> i64 {
        let expires_at = entitlement.created_at + Duration::days(self.expiration_period_days);
        let until_expiry = floor_days(expires_at - now);

        let Some(enrollment) = &entitlement.enrollment else {
            return until_expiry;
        };

        let since_course_start = floor_days(now - enrollment.course_start);
        let since_enrollment = floor_days(now - enrollment.enrolled_at);
        let since_created = floor_days(now - entitlement.created_at);
        let until_regain_ends = self.regain_period_days
            - since_course_start.min(since_enrollment).min(since_created);

        until_expiry.min(until_regain_ends)
    }

    pub fn is_past_expiration(&self, entitlement: &CourseEntitlement, now: DateTime<Utc>) -> bool {
        self.days_until_expiration(entitlement, now) < 0
    }
}
