//! Photo identity verifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lmsops_batch::ExpirableRecord;
use lmsops_core::{DomainError, RecordId, UserId, VerificationId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Created,
    Ready,
    Submitted,
    MustRetry,
    Approved,
    Denied,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Created => "created",
            VerificationStatus::Ready => "ready",
            VerificationStatus::Submitted => "submitted",
            VerificationStatus::MustRetry => "must_retry",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(VerificationStatus::Created),
            "ready" => Ok(VerificationStatus::Ready),
            "submitted" => Ok(VerificationStatus::Submitted),
            "must_retry" => Ok(VerificationStatus::MustRetry),
            "approved" => Ok(VerificationStatus::Approved),
            "denied" => Ok(VerificationStatus::Denied),
            other => Err(DomainError::validation(format!(
                "unknown verification status: {other}"
            ))),
        }
    }
}

/// One verification attempt.
///
/// `expiry_email_date` is the watermark of the expiry reminder. A superseded
/// attempt has both `expiry_date` and `expiry_email_date` cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoVerification {
    pub id: VerificationId,
    pub user_id: UserId,
    pub status: VerificationStatus,
    pub expiry_date: Option<DateTime<Utc>>,
    pub expiry_email_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PhotoVerification {
    pub fn new(id: VerificationId, user_id: UserId, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            status: VerificationStatus::Created,
            expiry_date: None,
            expiry_email_date: None,
            updated_at,
        }
    }

    /// An approved attempt that expired at `expiry_date`.
    pub fn approved(
        id: VerificationId,
        user_id: UserId,
        expiry_date: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: VerificationStatus::Approved,
            expiry_date: Some(expiry_date),
            ..Self::new(id, user_id, updated_at)
        }
    }

    pub fn with_expiry_email_date(mut self, at: DateTime<Utc>) -> Self {
        self.expiry_email_date = Some(at);
        self
    }
}

impl ExpirableRecord for PhotoVerification {
    fn record_id(&self) -> RecordId {
        self.id.into()
    }

    fn owner_id(&self) -> UserId {
        self.user_id
    }

    fn has_eligible_status(&self) -> bool {
        self.status == VerificationStatus::Approved
    }

    fn eligibility_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
    }

    fn last_action_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_email_date
    }
}
