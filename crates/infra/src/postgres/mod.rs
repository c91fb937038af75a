//! Postgres-backed repositories.
//!
//! The domain traits are synchronous; every adapter holds a [`PgContext`] and
//! drives its `sqlx` futures through the captured tokio runtime handle. Callers
//! must therefore invoke them from outside the runtime's own worker threads
//! (the CLI main thread or the batch worker pool).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

mod courses;
mod entitlements;
mod users;
mod verifications;

pub use courses::PgCourseStore;
pub use entitlements::PgEntitlementStore;
pub use users::PgUserDirectory;
pub use verifications::{PgEnrollmentLookup, PgVerificationStore};

use std::future::Future;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::Handle;
use tracing::info;

use lmsops_batch::RepositoryError;

/// Schema applied by `lmsops migrate`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Connection pool plus the runtime that drives it.
#[derive(Debug, Clone)]
pub struct PgContext {
    pool: PgPool,
    handle: Handle,
}

impl PgContext {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    /// Connect eagerly so an unreachable database fails the command up front.
    pub fn connect(url: &str, max_connections: u32, handle: Handle) -> Result<Self, sqlx::Error> {
        let pool = handle.block_on(
            PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url),
        )?;
        info!(max_connections, "database pool initialized");
        Ok(Self::new(pool, handle))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Apply the bundled schema. Idempotent.
    pub fn migrate(&self) -> Result<(), RepositoryError> {
        self.block_on(sqlx::raw_sql(SCHEMA).execute(&self.pool))
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("schema is up to date");
        Ok(())
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => RepositoryError::Conflict(msg),
                _ => RepositoryError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => RepositoryError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
