//! Watermark writer: records that an action happened and bounds resends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lmsops_core::{floor_days, start_of_day};

use crate::record::ExpirableRecord;
use crate::repository::{RecordRepository, RepositoryError};

/// How often, and how many times, a record may be actioned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendPolicy {
    /// Minimum whole days between two actions on the same record.
    pub cooldown_days: i64,
    /// Total number of actions before the record is excluded.
    pub max_actions: u32,
}

impl ResendPolicy {
    pub fn new(cooldown_days: i64, max_actions: u32) -> Self {
        Self {
            cooldown_days,
            max_actions,
        }
    }

    /// Days after `eligibility_at` at which the last action is due.
    pub fn final_action_after_days(&self) -> i64 {
        self.cooldown_days * i64::from(self.max_actions.saturating_sub(1))
    }

    /// True once the action performed at `now` is the last one allowed.
    ///
    /// A record without an eligibility date is treated as exhausted.
    pub fn is_exhausted(&self, eligibility_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match eligibility_at {
            Some(at) => floor_days(now - at) >= self.final_action_after_days(),
            None => true,
        }
    }

    /// Whether records excluded under this policy stay out of a first-action
    /// window reaching `days_range` days back.
    ///
    /// Exclusion clears the watermark, which is also how a never-actioned
    /// record looks, so the final action must land strictly after the window.
    pub fn fits_window(&self, days_range: i64) -> bool {
        self.final_action_after_days() > days_range
    }
}

/// Outcome of a watermark write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WatermarkDecision {
    /// Watermark set to the run date; the record is due again after the cooldown.
    Stamped(DateTime<Utc>),
    /// Watermark cleared; the record is never selected again.
    Excluded,
}

impl WatermarkDecision {
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        match self {
            WatermarkDecision::Stamped(at) => Some(*at),
            WatermarkDecision::Excluded => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkWriter<R> {
    repository: R,
    policy: ResendPolicy,
}

impl<R: RecordRepository> WatermarkWriter<R> {
    pub fn new(repository: R, policy: ResendPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> ResendPolicy {
        self.policy
    }

    /// Decide the next watermark without writing it.
    ///
    /// `renews` keeps an exhausted record in rotation.
    pub fn decide(&self, record: &R::Record, renews: bool, now: DateTime<Utc>) -> WatermarkDecision {
        if self.policy.is_exhausted(record.eligibility_at(), now) && !renews {
            WatermarkDecision::Excluded
        } else {
            WatermarkDecision::Stamped(start_of_day(now))
        }
    }

    pub fn write(
        &self,
        record: &R::Record,
        renews: bool,
        now: DateTime<Utc>,
    ) -> Result<WatermarkDecision, RepositoryError> {
        let decision = self.decide(record, renews, now);
        self.repository
            .update_watermark(record.record_id(), decision.watermark())?;
        debug!(record_id = %record.record_id(), ?decision, "watermark written");
        Ok(decision)
    }
}
