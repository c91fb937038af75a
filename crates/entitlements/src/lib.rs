//! `lmsops-entitlements`
//!
//! Reaps course entitlements whose expiration period has passed. Most
//! entitlements expire as learners use the platform; this covers the learners
//! who stopped logging in.
//!
//! The command only partitions the id space and enqueues range tasks; each task
//! re-reads its slice and applies the `ExpirationPolicy`, so tasks are
//! idempotent and can be retried or run in parallel.

pub mod command;
pub mod entitlement;
pub mod expirer;
pub mod repository;

pub use command::{DEFAULT_BATCH_SIZE, EXPIRE_TASK_NAME, ExpireError, ExpireOldEntitlements};
pub use entitlement::{CourseEntitlement, EntitlementEnrollment, ExpirationPolicy};
pub use expirer::{EntitlementExpirer, ExpirationSummary};
pub use repository::{EntitlementRepository, InMemoryEntitlementStore};
