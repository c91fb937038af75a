//! `lmsops-core`: shared building blocks for the maintenance commands.
//!
//! This crate contains **no infrastructure**: identifiers, the error model, the
//! clock abstraction and the collaborator traits (users, mail) that the domain
//! crates consume.

pub mod clock;
pub mod error;
pub mod id;
pub mod mail;
pub mod time;
pub mod user;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::DomainError;
pub use id::{CourseEntitlementId, RecordId, UserId, VerificationId};
pub use mail::{EmailMessage, InMemoryOutbox, MailError, Mailer};
pub use time::{floor_days, start_of_day};
pub use user::{DirectoryError, InMemoryUserDirectory, User, UserDirectory, user_from_str};
