//! Dispatchers: run an action per selected record, or enqueue range tasks.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::batcher::{BatchRange, chunk, id_ranges};
use crate::queue::{BatchTask, QueueError, TaskId, TaskQueue};
use crate::record::ExpirableRecord;
use crate::repository::{RecordRepository, RepositoryError};
use crate::selector::{EligibilityPredicate, Selector};
use crate::watermark::{ResendPolicy, WatermarkDecision, WatermarkWriter};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Lookup(String),
    #[error("{0}")]
    Delivery(String),
    #[error("{0}")]
    Storage(String),
}

/// The side effect performed once per eligible record.
///
/// Must be safe to repeat: the watermark is only written after `perform`
/// succeeds, so a crash in between re-sends on the next run.
pub trait RecordAction: Send + Sync {
    type Record: ExpirableRecord;

    fn perform(&self, record: &Self::Record) -> Result<(), ActionError>;

    /// Whether the record stays in rotation after its last allowed action.
    fn renews(&self, _record: &Self::Record) -> Result<bool, ActionError> {
        Ok(false)
    }

    /// Log line for a dry-run batch of `count` records.
    fn dry_run_message(&self, count: usize) -> String {
        format!("dry run: {count} record(s) would have been actioned")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub batch_size: usize,
    /// Sleep between two batches.
    pub pause: Duration,
    pub dry_run: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            pause: Duration::ZERO,
            dry_run: false,
        }
    }
}

/// Counts produced by one dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub matched: usize,
    pub batches: usize,
    /// Actions performed (or, in dry-run, that would have been performed).
    pub actioned: usize,
    /// Records whose watermark was cleared for good.
    pub excluded: usize,
    pub failed: usize,
    /// Actions that succeeded but whose watermark could not be saved.
    pub watermark_errors: usize,
    /// Actions that succeeded but whose renewal check failed.
    pub renewal_errors: usize,
    pub dry_run: bool,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.watermark_errors == 0 && self.renewal_errors == 0
    }
}

/// Selector → Batcher → action → Watermark Writer, inline.
#[derive(Debug, Clone)]
pub struct Dispatcher<R, A> {
    repository: R,
    action: A,
    policy: ResendPolicy,
}

impl<R, A> Dispatcher<R, A>
where
    R: RecordRepository,
    A: RecordAction<Record = R::Record>,
{
    pub fn new(repository: R, action: A, policy: ResendPolicy) -> Self {
        Self {
            repository,
            action,
            policy,
        }
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// Eligible records in dispatch order.
    pub fn select(&self, predicate: &EligibilityPredicate) -> Result<Vec<R::Record>, RepositoryError> {
        Selector::new(&self.repository).select(predicate)
    }

    /// Select records eligible at `now` and act on them batch by batch.
    pub fn run(
        &self,
        predicate: &EligibilityPredicate,
        options: &DispatchOptions,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, RepositoryError> {
        let records = self.select(predicate)?;
        Ok(self.dispatch(records, options, now))
    }

    /// Act on already-selected records batch by batch.
    pub fn dispatch(
        &self,
        records: Vec<R::Record>,
        options: &DispatchOptions,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            matched: records.len(),
            dry_run: options.dry_run,
            ..Default::default()
        };

        if records.is_empty() {
            debug!("no eligible records");
            return report;
        }

        let batches = chunk(records, options.batch_size);
        report.batches = batches.len();
        let writer = WatermarkWriter::new(&self.repository, self.policy);
        let last = batches.len() - 1;

        for batch in batches {
            if options.dry_run {
                info!("{}", self.action.dry_run_message(batch.len()));
                report.actioned += batch.len();
                continue;
            }

            debug!(batch = batch.index, size = batch.len(), "dispatching batch");
            for record in &batch.items {
                self.dispatch_one(record, &writer, now, &mut report);
            }

            if batch.index < last && !options.pause.is_zero() {
                thread::sleep(options.pause);
            }
        }

        report
    }

    fn dispatch_one(
        &self,
        record: &R::Record,
        writer: &WatermarkWriter<&R>,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) {
        if let Err(err) = self.action.perform(record) {
            error!(record_id = %record.record_id(), owner_id = %record.owner_id(), "{err}");
            report.failed += 1;
            return;
        }
        report.actioned += 1;

        // Only an exhausted record needs the renewal check. If it fails the
        // watermark stays as it was and the record comes up again next run.
        let renews = if writer.policy().is_exhausted(record.eligibility_at(), now) {
            match self.action.renews(record) {
                Ok(renews) => renews,
                Err(err) => {
                    warn!(record_id = %record.record_id(), error = %err, "renewal check failed, watermark left unchanged");
                    report.renewal_errors += 1;
                    return;
                }
            }
        } else {
            false
        };

        match writer.write(record, renews, now) {
            Ok(WatermarkDecision::Excluded) => report.excluded += 1,
            Ok(WatermarkDecision::Stamped(_)) => {}
            Err(err) => {
                error!(record_id = %record.record_id(), error = %err, "failed to write watermark");
                report.watermark_errors += 1;
            }
        }
    }
}

/// Outcome of planning or enqueueing range batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangeDispatchReport {
    pub ranges: Vec<BatchRange>,
    pub task_ids: Vec<TaskId>,
}

impl RangeDispatchReport {
    /// Ranges covering ids `1..=upper_id`, nothing submitted.
    pub fn plan(upper_id: i64, batch_size: usize) -> Self {
        Self {
            ranges: id_ranges(upper_id, batch_size),
            task_ids: Vec::new(),
        }
    }

    pub fn batches(&self) -> usize {
        self.ranges.len()
    }

    pub fn enqueued(&self) -> usize {
        self.task_ids.len()
    }
}

/// Submission stopped partway; `report` holds the tasks already queued.
#[derive(Debug, thiserror::Error)]
#[error("{source} after enqueuing {} of {} tasks", .report.enqueued(), .report.batches())]
pub struct EnqueueError {
    pub report: RangeDispatchReport,
    pub source: QueueError,
}

/// Hands primary-key ranges to a task queue, one task per range.
#[derive(Debug, Clone)]
pub struct RangeDispatcher<Q> {
    queue: Q,
    task_name: String,
}

impl<Q: TaskQueue> RangeDispatcher<Q> {
    pub fn new(queue: Q, task_name: impl Into<String>) -> Self {
        Self {
            queue,
            task_name: task_name.into(),
        }
    }

    pub fn plan(&self, upper_id: i64, batch_size: usize) -> RangeDispatchReport {
        RangeDispatchReport::plan(upper_id, batch_size)
    }

    /// Submit one task per range; the batch index is the task's log id.
    pub fn enqueue(&self, upper_id: i64, batch_size: usize) -> Result<RangeDispatchReport, EnqueueError> {
        let mut report = self.plan(upper_id, batch_size);
        for (n, range) in report.ranges.clone().into_iter().enumerate() {
            let task = BatchTask::new(self.task_name.clone(), range, n.to_string());
            match self.queue.submit(task) {
                Ok(id) => {
                    debug!(task_id = %id, range = %range, "enqueued task");
                    report.task_ids.push(id);
                }
                Err(source) => {
                    error!(
                        enqueued = report.enqueued(),
                        remaining = report.batches() - report.enqueued(),
                        error = %source,
                        "stopped enqueueing tasks"
                    );
                    return Err(EnqueueError { report, source });
                }
            }
        }
        Ok(report)
    }
}
