//! `lmsops-verification`
//!
//! Reminds learners that their photo identity verification expired. Runs on
//! the generic dispatcher from `lmsops-batch`: the expiry date drives
//! eligibility and `expiry_email_date` is the resend watermark.

pub mod action;
pub mod command;
pub mod repository;
pub mod settings;
pub mod verification;

pub use action::{EXPIRY_EMAIL_TEMPLATE, ExpiryEmailAction};
pub use command::{ExpiryEmailOptions, SendVerificationExpiryEmail};
pub use repository::{
    EnrollmentLookup, InMemoryEnrollments, InMemoryVerificationStore, most_recent_per_user,
};
pub use settings::ExpiryEmailSettings;
pub use verification::{PhotoVerification, VerificationStatus};
