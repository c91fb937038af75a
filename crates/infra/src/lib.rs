//! `lmsops-infra`: adapters behind the domain traits.
//!
//! - `config`: the YAML settings file
//! - `postgres`: `sqlx` repositories driven through a tokio handle
//! - `mail`: log and spool mail backends
//! - `catalog`: course runs from an exported discovery response

pub mod catalog;
pub mod config;
pub mod mail;
pub mod postgres;

pub use catalog::JsonFileCatalog;
pub use config::{
    CatalogSettings, ConfigError, DatabaseSettings, EntitlementSettings, MailBackend, MailSettings,
    Settings, TaskQueueSettings,
};
pub use mail::{LogMailer, SpoolMailer, build_mailer};
pub use postgres::{
    PgContext, PgCourseStore, PgEnrollmentLookup, PgEntitlementStore, PgUserDirectory,
    PgVerificationStore, SCHEMA,
};
