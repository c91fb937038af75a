//! `expire-old-entitlements`: partition the entitlement table and enqueue tasks.

use tracing::info;

use lmsops_batch::{EnqueueError, RangeDispatchReport, RangeDispatcher, RepositoryError, TaskQueue};

use crate::repository::EntitlementRepository;

/// Handler name the worker pool routes expiration tasks by.
pub const EXPIRE_TASK_NAME: &str = "entitlements.expire_old_entitlements";

/// Entitlements per task; adjust if tasks run too long.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ExpireError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
}

/// Finds the id space to cover and hands it to the task queue in ranges.
#[derive(Debug, Clone)]
pub struct ExpireOldEntitlements<R> {
    repository: R,
}

impl<R: EntitlementRepository> ExpireOldEntitlements<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Ranges run up to the highest id rather than the row count, so gaps in
    /// the id sequence show up as extra, partly empty batches.
    fn upper_id(&self) -> Result<i64, RepositoryError> {
        info!("Looking for entitlements which may be expirable.");
        Ok(self.repository.max_id()?.map(|id| id.get()).unwrap_or(0))
    }

    /// Report how many tasks a commit run would enqueue, without enqueueing.
    pub fn preview(&self, batch_size: usize) -> Result<RangeDispatchReport, ExpireError> {
        let upper_id = self.upper_id()?;
        let plan = RangeDispatchReport::plan(upper_id, batch_size);
        info!(
            "Found {} batches. To enqueue entitlement expiration tasks, pass the -c or --commit flags.",
            plan.batches()
        );
        Ok(plan)
    }

    /// Enqueue one expiration task per id range.
    pub fn commit<Q: TaskQueue>(&self, batch_size: usize, queue: Q) -> Result<RangeDispatchReport, ExpireError> {
        let upper_id = self.upper_id()?;
        let dispatcher = RangeDispatcher::new(queue, EXPIRE_TASK_NAME);
        info!(
            "Enqueuing {} entitlement expiration tasks.",
            dispatcher.plan(upper_id, batch_size).batches()
        );

        let report = dispatcher.enqueue(upper_id, batch_size)?;
        info!("Done. Successfully enqueued {} tasks.", report.enqueued());
        Ok(report)
    }
}
