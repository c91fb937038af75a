//! The reminder email sent for an expired verification.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use lmsops_batch::{ActionError, RecordAction};
use lmsops_core::{EmailMessage, Mailer, User, UserDirectory};

use crate::repository::EnrollmentLookup;
use crate::settings::ExpiryEmailSettings;
use crate::verification::PhotoVerification;

pub const EXPIRY_EMAIL_TEMPLATE: &str = "verificationexpiry";

pub struct ExpiryEmailAction {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    enrollments: Arc<dyn EnrollmentLookup>,
    settings: ExpiryEmailSettings,
}

impl ExpiryEmailAction {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        enrollments: Arc<dyn EnrollmentLookup>,
        settings: ExpiryEmailSettings,
    ) -> Self {
        Self {
            users,
            mailer,
            enrollments,
            settings,
        }
    }

    pub fn message_for(&self, user: &User, verification: &PhotoVerification) -> EmailMessage {
        let expiry_date = verification
            .expiry_date
            .map(|at| at.date_naive().to_string());
        EmailMessage::new(
            user.email.clone(),
            EXPIRY_EMAIL_TEMPLATE,
            json!({
                "platform_name": self.settings.platform_name,
                "username": user.username,
                "expiry_date": expiry_date,
                "resend_days": self.settings.resend_days,
                "lms_verification_link": self.settings.reverify_url(),
            }),
        )
    }
}

impl RecordAction for ExpiryEmailAction {
    type Record = PhotoVerification;

    fn perform(&self, record: &PhotoVerification) -> Result<(), ActionError> {
        let user = self
            .users
            .get_by_id(record.user_id)
            .map_err(|e| ActionError::Lookup(e.to_string()))?
            .ok_or_else(|| {
                ActionError::Lookup(format!(
                    "Could not send email for verification expiry to user {}: no such user",
                    record.user_id
                ))
            })?;

        let message = self.message_for(&user, record);
        self.mailer.send(&message).map_err(|e| {
            debug!(user_id = %user.id, error = %e, "mail backend rejected message");
            ActionError::Delivery(format!(
                "Could not send email for verification expiry to user {}",
                user.username
            ))
        })
    }

    fn renews(&self, record: &PhotoVerification) -> Result<bool, ActionError> {
        self.enrollments
            .has_verified_enrollment(record.user_id)
            .map_err(|e| ActionError::Storage(e.to_string()))
    }

    fn dry_run_message(&self, count: usize) -> String {
        format!(
            "This was a dry run, no email was sent. For the actual run email would have been sent to {count} learner(s)"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lmsops_core::{InMemoryOutbox, InMemoryUserDirectory, UserId, VerificationId};

    use crate::repository::InMemoryEnrollments;

    fn fixture() -> (Arc<InMemoryUserDirectory>, Arc<InMemoryOutbox>, ExpiryEmailAction) {
        let users = Arc::new(InMemoryUserDirectory::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let action = ExpiryEmailAction::new(
            users.clone(),
            outbox.clone(),
            Arc::new(InMemoryEnrollments::new()),
            ExpiryEmailSettings::default(),
        );
        (users, outbox, action)
    }

    fn verification(user: i64) -> PhotoVerification {
        let at = Utc.with_ymd_and_hms(2024, 5, 19, 8, 0, 0).unwrap();
        PhotoVerification::approved(VerificationId::new(1), UserId::new(user), at, at)
    }

    #[test]
    fn sends_the_expiry_template_to_the_learner() {
        let (users, outbox, action) = fixture();
        users.insert(User::new(UserId::new(4), "ada", "ada@example.org"));

        action.perform(&verification(4)).unwrap();

        let sent = outbox.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.org");
        assert_eq!(sent[0].template, EXPIRY_EMAIL_TEMPLATE);
        assert_eq!(sent[0].context["expiry_date"], "2024-05-19");
        assert_eq!(sent[0].context["resend_days"], 15);
    }

    #[test]
    fn unknown_learner_is_a_lookup_failure() {
        let (_, outbox, action) = fixture();
        let err = action.perform(&verification(99)).unwrap_err();
        assert!(matches!(err, ActionError::Lookup(_)));
        assert!(outbox.is_empty());
    }

    #[test]
    fn rejected_delivery_names_the_learner() {
        let (users, _, action) = fixture();
        users.insert(User::new(UserId::new(4), "ada", "not-an-address"));

        let err = action.perform(&verification(4)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not send email for verification expiry to user ada"
        );
    }
}
