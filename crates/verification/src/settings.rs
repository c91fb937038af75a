use serde::{Deserialize, Serialize};

use lmsops_batch::ResendPolicy;
use lmsops_core::DomainError;

/// Configuration of the verification expiry reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryEmailSettings {
    /// Days to wait before reminding the same learner again.
    pub resend_days: i64,
    /// How many days back a fresh expiry is picked up.
    pub days_range: i64,
    /// Reminders sent to learners without a verified enrollment.
    pub default_emails: u32,
    pub platform_name: String,
    pub lms_root_url: String,
}

impl Default for ExpiryEmailSettings {
    fn default() -> Self {
        Self {
            resend_days: 15,
            days_range: 1,
            default_emails: 2,
            platform_name: "Open edX".to_string(),
            lms_root_url: "http://localhost:8000".to_string(),
        }
    }
}

impl ExpiryEmailSettings {
    pub fn resend_policy(&self) -> ResendPolicy {
        ResendPolicy::new(self.resend_days, self.default_emails)
    }

    /// Reject settings under which a learner who got the last reminder could
    /// be picked up again as a fresh expiry.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.resend_days <= 0 || self.days_range <= 0 {
            return Err(DomainError::validation(
                "resend_days and days_range must be positive",
            ));
        }
        if !self.resend_policy().fits_window(self.days_range) {
            return Err(DomainError::validation(format!(
                "resend_days * (default_emails - 1) must exceed days_range ({} * ({} - 1) <= {})",
                self.resend_days, self.default_emails, self.days_range
            )));
        }
        Ok(())
    }

    pub fn reverify_url(&self) -> String {
        format!("{}/verify_student/reverify", self.lms_root_url.trim_end_matches('/'))
    }
}
