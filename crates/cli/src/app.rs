//! Command wiring: settings + collaborators in, summaries out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use lmsops_batch::{DispatchReport, PoolStats, RecordRepository, WorkerPool};
use lmsops_core::{Clock, Mailer, UserDirectory};
use lmsops_courses::{CatalogClient, CourseStore, SyncCourses, SyncReport};
use lmsops_entitlements::{EXPIRE_TASK_NAME, EntitlementExpirer, EntitlementRepository, ExpireOldEntitlements};
use lmsops_infra::{
    JsonFileCatalog, PgContext, PgCourseStore, PgEnrollmentLookup, PgEntitlementStore,
    PgUserDirectory, PgVerificationStore, Settings, build_mailer,
};
use lmsops_verification::{
    EnrollmentLookup, ExpiryEmailAction, ExpiryEmailOptions, PhotoVerification,
    SendVerificationExpiryEmail,
};

use crate::cli::{ExpireArgs, ExpiryEmailArgs, SyncArgs};

pub type VerificationRepository = dyn RecordRepository<Record = PhotoVerification>;

/// Everything the commands talk to.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub verifications: Arc<VerificationRepository>,
    pub enrollments: Arc<dyn EnrollmentLookup>,
    pub courses: Arc<dyn CourseStore>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    pub fn postgres(ctx: &PgContext, settings: &Settings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let mailer = build_mailer(&settings.mail).context("failed to set up mail backend")?;
        Ok(Self {
            users: Arc::new(PgUserDirectory::new(ctx.clone())),
            entitlements: Arc::new(PgEntitlementStore::new(ctx.clone())),
            verifications: Arc::new(PgVerificationStore::new(ctx.clone())),
            enrollments: Arc::new(PgEnrollmentLookup::new(ctx.clone())),
            courses: Arc::new(PgCourseStore::new(ctx.clone())),
            mailer,
            clock,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpireSummary {
    pub committed: bool,
    pub batches: usize,
    pub enqueued: usize,
    /// Worker pool totals once every enqueued task has run.
    pub pool: Option<PoolStats>,
}

/// `expire-old-entitlements`.
///
/// With `--commit` the tasks run on an in-process worker pool and this
/// returns after the pool has drained.
pub fn expire_old_entitlements(
    args: &ExpireArgs,
    settings: &Settings,
    backends: &Backends,
) -> anyhow::Result<ExpireSummary> {
    let batch_size = args.batch_size.unwrap_or(settings.entitlements.batch_size).max(1);
    let command = ExpireOldEntitlements::new(backends.entitlements.clone());

    if !args.commit {
        let plan = command.preview(batch_size)?;
        return Ok(ExpireSummary {
            batches: plan.batches(),
            ..Default::default()
        });
    }

    let expirer = EntitlementExpirer::new(
        backends.entitlements.clone(),
        settings.entitlements.policy,
        backends.clock.clone(),
    );
    let mut pool = WorkerPool::new();
    pool.register_handler(EXPIRE_TASK_NAME, move |task| expirer.handle(task));

    let mut pool_config = settings.task_queue.pool_config("entitlement-expiry");
    if let Some(workers) = args.workers {
        pool_config = pool_config.with_workers(workers.max(1));
    }
    let handle = pool.spawn(pool_config)?;

    let report = command.commit(batch_size, handle.queue());
    let stats = handle.shutdown();
    let report = report?;

    info!(
        tasks = stats.tasks_processed,
        failed = stats.tasks_failed,
        examined = stats.rows_examined,
        "entitlement expiration tasks finished"
    );
    Ok(ExpireSummary {
        committed: true,
        batches: report.batches(),
        enqueued: report.enqueued(),
        pool: Some(stats),
    })
}

/// `send-verification-expiry-email`.
pub fn send_verification_expiry_email(
    args: &ExpiryEmailArgs,
    settings: &Settings,
    backends: &Backends,
) -> anyhow::Result<DispatchReport> {
    let email_settings = settings.verification_expiry_email.clone();
    let action = ExpiryEmailAction::new(
        backends.users.clone(),
        backends.mailer.clone(),
        backends.enrollments.clone(),
        email_settings.clone(),
    );
    let command = SendVerificationExpiryEmail::new(
        backends.verifications.clone(),
        action,
        email_settings,
        backends.clock.clone(),
    )?;
    let options = ExpiryEmailOptions {
        batch_size: args.batch_size,
        sleep_time: Duration::from_secs(args.sleep_time),
        dry_run: args.dry_run,
    };
    Ok(command.run(&options)?)
}

/// Catalog named on the command line, else the configured one.
pub fn catalog_for(args: &SyncArgs, settings: &Settings) -> anyhow::Result<Arc<dyn CatalogClient>> {
    let path = args
        .catalog
        .clone()
        .or_else(|| settings.catalog.path.clone())
        .context("no catalog configured: pass --catalog or set catalog.path")?;
    Ok(Arc::new(JsonFileCatalog::new(path)))
}

/// `sync-courses`.
pub fn sync_courses(
    args: &SyncArgs,
    catalog: Arc<dyn CatalogClient>,
    backends: &Backends,
) -> anyhow::Result<SyncReport> {
    let command = SyncCourses::new(backends.users.clone(), catalog, backends.courses.clone());
    let report = command.run(&args.instructor)?;
    info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        "course sync finished"
    );
    Ok(report)
}
