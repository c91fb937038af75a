//! The record shape the dispatcher operates on.

use chrono::{DateTime, Utc};

use lmsops_core::{RecordId, UserId};

/// A persisted row that becomes actionable with time.
///
/// `last_action_at` is the watermark: `None` before the first action and again,
/// permanently, once the record has used up its resends.
pub trait ExpirableRecord: Clone + Send + Sync + core::fmt::Debug {
    fn record_id(&self) -> RecordId;

    /// The user the action is addressed to.
    fn owner_id(&self) -> UserId;

    fn has_eligible_status(&self) -> bool;

    fn eligibility_at(&self) -> Option<DateTime<Utc>>;

    fn last_action_at(&self) -> Option<DateTime<Utc>>;
}
