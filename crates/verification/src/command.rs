//! `send-verification-expiry-email`: remind learners whose verification expired.

use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{info, warn};

use lmsops_batch::{
    DispatchOptions, DispatchReport, Dispatcher, EligibilityPredicate, RecordRepository,
    RepositoryError,
};
use lmsops_core::{Clock, DomainError, start_of_day};

use crate::action::ExpiryEmailAction;
use crate::settings::ExpiryEmailSettings;
use crate::verification::PhotoVerification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryEmailOptions {
    pub batch_size: usize,
    /// Pause between two batches.
    pub sleep_time: StdDuration,
    pub dry_run: bool,
}

impl Default for ExpiryEmailOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            sleep_time: StdDuration::from_secs(10),
            dry_run: false,
        }
    }
}

impl ExpiryEmailOptions {
    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            batch_size: self.batch_size.max(1),
            pause: self.sleep_time,
            dry_run: self.dry_run,
        }
    }
}

/// Sends the expiry reminder to learners whose most recent approved
/// verification expired in the last `days_range` days, or whose last reminder
/// is at least `resend_days` old.
///
/// After `default_emails` reminders the watermark is cleared for good, unless
/// the learner is enrolled in a verified track.
pub struct SendVerificationExpiryEmail<R, C> {
    dispatcher: Dispatcher<R, ExpiryEmailAction>,
    settings: ExpiryEmailSettings,
    clock: C,
}

impl<R, C> SendVerificationExpiryEmail<R, C>
where
    R: RecordRepository<Record = PhotoVerification>,
    C: Clock,
{
    /// Fails when `settings` would let an excluded learner be reminded again.
    pub fn new(
        repository: R,
        action: ExpiryEmailAction,
        settings: ExpiryEmailSettings,
        clock: C,
    ) -> Result<Self, DomainError> {
        settings.validate()?;
        let policy = settings.resend_policy();
        Ok(Self {
            dispatcher: Dispatcher::new(repository, action, policy),
            settings,
            clock,
        })
    }

    pub fn settings(&self) -> &ExpiryEmailSettings {
        &self.settings
    }

    pub fn run(&self, options: &ExpiryEmailOptions) -> Result<DispatchReport, RepositoryError> {
        let now = self.clock.now();
        let predicate = EligibilityPredicate::for_run(
            start_of_day(now),
            self.settings.days_range,
            self.settings.resend_days,
        );
        let start_date = (now - Duration::days(self.settings.days_range)).date_naive();
        let today = now.date_naive();

        let verifications = self.dispatcher.select(&predicate)?;
        if verifications.is_empty() {
            info!(
                "No approved expired entries found in SoftwareSecurePhotoVerification for the date range {} - {}",
                start_date, today
            );
        } else {
            info!(
                "For the date range {} - {}, total Software Secure Photo verification filtered are {}",
                start_date,
                today,
                verifications.len()
            );
        }

        let report = self
            .dispatcher
            .dispatch(verifications, &options.dispatch_options(), now);
        if !report.is_clean() {
            warn!(
                failed = report.failed,
                watermark_errors = report.watermark_errors,
                renewal_errors = report.renewal_errors,
                "some verification expiry emails were not recorded"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use lmsops_core::{
        FixedClock, InMemoryOutbox, InMemoryUserDirectory, User, UserId, VerificationId,
    };

    use crate::repository::{EnrollmentLookup, InMemoryEnrollments, InMemoryVerificationStore};

    type Command = SendVerificationExpiryEmail<Arc<InMemoryVerificationStore>, Arc<FixedClock>>;

    struct Harness {
        store: Arc<InMemoryVerificationStore>,
        users: Arc<InMemoryUserDirectory>,
        outbox: Arc<InMemoryOutbox>,
        enrollments: Arc<InMemoryEnrollments>,
        command: Command,
        next_user: i64,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 13, 45, 0).unwrap()
    }

    fn today() -> DateTime<Utc> {
        start_of_day(now())
    }

    fn options() -> ExpiryEmailOptions {
        ExpiryEmailOptions {
            sleep_time: StdDuration::ZERO,
            ..Default::default()
        }
    }

    impl Harness {
        fn new() -> Self {
            Self::with_settings(ExpiryEmailSettings::default())
        }

        fn with_settings(settings: ExpiryEmailSettings) -> Self {
            let store = InMemoryVerificationStore::arc();
            let users = Arc::new(InMemoryUserDirectory::new());
            let outbox = Arc::new(InMemoryOutbox::new());
            let enrollments = Arc::new(InMemoryEnrollments::new());
            let action = ExpiryEmailAction::new(
                users.clone(),
                outbox.clone(),
                enrollments.clone(),
                settings.clone(),
            );
            let command = SendVerificationExpiryEmail::new(
                store.clone(),
                action,
                settings,
                Arc::new(FixedClock::new(now())),
            )
            .unwrap();
            Self {
                store,
                users,
                outbox,
                enrollments,
                command,
                next_user: 1,
            }
        }

        /// Approved verification for a fresh learner, expired at `expiry_date`.
        fn approved(&mut self, expiry_date: DateTime<Utc>) -> PhotoVerification {
            let id = self.next_user;
            self.next_user += 1;
            self.users.insert(User::new(
                UserId::new(id),
                format!("learner{id}"),
                format!("learner{id}@example.org"),
            ));
            let v = PhotoVerification::approved(
                VerificationId::new(id),
                UserId::new(id),
                expiry_date,
                now() - Duration::days(365),
            );
            self.store.insert(v.clone());
            v
        }

        fn watermark(&self, v: &PhotoVerification) -> Option<DateTime<Utc>> {
            self.store.get(v.id).and_then(|row| row.expiry_email_date)
        }

        fn run(&self) -> DispatchReport {
            self.command.run(&options()).unwrap()
        }
    }

    #[test]
    fn only_expiries_inside_the_range_are_emailed() {
        let mut h = Harness::new();
        let in_range = h.approved(now() - Duration::days(1));
        let out_of_range = h.approved(now() - Duration::days(2));

        h.run();

        assert_eq!(h.outbox.len(), 1);
        assert_eq!(h.watermark(&in_range), Some(today()));
        assert_eq!(h.watermark(&out_of_range), None);
    }

    #[test]
    fn reminder_is_resent_once_the_cooldown_has_passed() {
        let mut h = Harness::new();
        let v = h
            .approved(today() - Duration::days(2))
            .with_expiry_email_date(today() - Duration::days(15));
        h.store.insert(v);

        h.run();

        assert_eq!(h.outbox.len(), 1);
    }

    #[test]
    fn sending_stamps_the_run_date() {
        let mut h = Harness::new();
        let v = h.approved(now() - Duration::days(1));

        let report = h.run();

        assert_eq!(report.actioned, 1);
        assert!(report.is_clean());
        assert_eq!(h.watermark(&v), Some(today()));
        assert_eq!(h.outbox.messages()[0].to, "learner1@example.org");
    }

    #[test]
    fn recent_reminder_is_not_repeated() {
        let mut h = Harness::new();
        let v = h
            .approved(now() - Duration::days(1))
            .with_expiry_email_date(now());
        h.store.insert(v);

        h.run();

        assert!(h.outbox.is_empty());
    }

    #[test]
    fn immediate_rerun_sends_nothing_more() {
        let mut h = Harness::new();
        h.approved(now() - Duration::days(1));

        h.run();
        let second = h.run();

        assert_eq!(second.matched, 0);
        assert_eq!(h.outbox.len(), 1);
    }

    #[test]
    fn nothing_found_is_a_successful_empty_run() {
        let h = Harness::new();
        let report = h.run();
        assert_eq!(report, DispatchReport::default());
        assert!(h.outbox.is_empty());
    }

    #[test]
    fn dry_run_counts_without_sending_or_stamping() {
        let mut h = Harness::new();
        let v = h.approved(now() - Duration::days(1));

        let report = h
            .command
            .run(&ExpiryEmailOptions {
                dry_run: true,
                ..options()
            })
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.matched, 1);
        assert_eq!(report.actioned, 1);
        assert!(h.outbox.is_empty());
        assert_eq!(h.watermark(&v), None);
    }

    #[test]
    fn last_reminder_without_verified_enrollment_clears_the_watermark() {
        let mut h = Harness::new();
        let v = h
            .approved(now() - Duration::days(15))
            .with_expiry_email_date(today() - Duration::days(15));
        h.store.insert(v.clone());

        let report = h.run();

        assert_eq!(h.outbox.len(), 1);
        assert_eq!(report.excluded, 1);
        assert_eq!(h.watermark(&v), None);
    }

    #[test]
    fn verified_enrollment_keeps_the_reminder_in_rotation() {
        let mut h = Harness::new();
        let v = h
            .approved(now() - Duration::days(15))
            .with_expiry_email_date(today() - Duration::days(15));
        h.store.insert(v.clone());
        h.enrollments.enroll_verified(v.user_id);

        h.run();

        assert_eq!(h.watermark(&v), Some(today()));
    }

    struct EnrollmentsDown;

    impl EnrollmentLookup for EnrollmentsDown {
        fn has_verified_enrollment(&self, _user_id: UserId) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Storage("connection reset".into()))
        }
    }

    #[test]
    fn failed_enrollment_lookup_keeps_the_learner_in_rotation() {
        let mut h = Harness::new();
        let last_sent = today() - Duration::days(15);
        let v = h
            .approved(now() - Duration::days(15))
            .with_expiry_email_date(last_sent);
        h.store.insert(v.clone());
        let settings = ExpiryEmailSettings::default();
        let action = ExpiryEmailAction::new(
            h.users.clone(),
            h.outbox.clone(),
            Arc::new(EnrollmentsDown),
            settings.clone(),
        );
        let command = SendVerificationExpiryEmail::new(
            h.store.clone(),
            action,
            settings,
            Arc::new(FixedClock::new(now())),
        )
        .unwrap();

        let report = command.run(&options()).unwrap();

        assert_eq!(h.outbox.len(), 1);
        assert_eq!(report.excluded, 0);
        assert_eq!(report.renewal_errors, 1);
        assert!(!report.is_clean());
        assert_eq!(h.watermark(&v), Some(last_sent));
    }

    #[test]
    fn single_reminder_settings_are_refused() {
        let settings = ExpiryEmailSettings {
            default_emails: 1,
            ..Default::default()
        };
        let action = ExpiryEmailAction::new(
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemoryOutbox::new()),
            Arc::new(InMemoryEnrollments::new()),
            settings.clone(),
        );

        let result = SendVerificationExpiryEmail::new(
            InMemoryVerificationStore::arc(),
            action,
            settings,
            Arc::new(FixedClock::new(now())),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn excluded_learner_is_not_reminded_on_same_day_reruns() {
        // Narrowest accepted window: the last reminder is due two days after expiry.
        let mut h = Harness::with_settings(ExpiryEmailSettings {
            resend_days: 2,
            days_range: 1,
            default_emails: 2,
            ..Default::default()
        });
        let v = h
            .approved(now() - Duration::days(2))
            .with_expiry_email_date(today() - Duration::days(2));
        h.store.insert(v.clone());

        let first = h.run();
        h.run();
        h.run();

        assert_eq!(first.excluded, 1);
        assert_eq!(h.watermark(&v), None);
        assert_eq!(h.outbox.len(), 1);
    }

    #[test]
    fn at_most_default_emails_are_sent() {
        let mut h = Harness::new();
        let mut v = h.approved(now() - Duration::days(1));
        h.run();

        let default_emails = h.command.settings().default_emails as i64;
        for i in 1..=default_emails + 1 {
            if h.watermark(&v).is_none() {
                break;
            }
            v.expiry_date = Some(today() - Duration::days(15 * i + 1));
            v.expiry_email_date = Some(today() - Duration::days(15));
            h.store.insert(v.clone());
            h.run();
        }

        assert_eq!(h.watermark(&v), None);
        assert_eq!(h.outbox.len() as i64, default_emails);
    }

    #[test]
    fn batch_size_one_makes_one_batch_per_learner() {
        let mut h = Harness::new();
        for _ in 0..3 {
            h.approved(now() - Duration::days(1));
        }

        let report = h
            .command
            .run(&ExpiryEmailOptions {
                batch_size: 1,
                ..options()
            })
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(h.outbox.len(), 3);
    }

    #[test]
    fn failed_delivery_is_counted_and_leaves_the_watermark() {
        let mut h = Harness::new();
        let v = h.approved(now() - Duration::days(1));
        h.users
            .insert(User::new(v.user_id, "nomail", "not-an-address"));

        let report = h.run();

        assert_eq!(report.failed, 1);
        assert!(!report.is_clean());
        assert_eq!(h.watermark(&v), None);
    }
}
