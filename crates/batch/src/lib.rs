//! `lmsops-batch`: the batch expiry dispatcher.
//!
//! ## Pipeline
//!
//! ```text
//! Selector (predicate) → Batcher (ranges / chunks) → Dispatcher → Watermark Writer
//!                                        └→ TaskQueue → WorkerPool
//! ```
//!
//! - `Selector`: eligible records from a `RecordRepository`
//! - `batcher`: fixed-size partitions by primary-key range or offset
//! - `Dispatcher`: runs a `RecordAction` per record, honouring dry-run
//! - `WatermarkWriter`: stamps or permanently clears `last_action_at`
//! - `queue`: channel-backed task queue consumed by a worker pool
//!
//! Every unit of work must be idempotent: batches may run twice or out of order.

pub mod batcher;
pub mod dispatcher;
pub mod queue;
pub mod record;
pub mod repository;
pub mod selector;
pub mod watermark;

pub use batcher::{Batch, BatchRange, batch_count, chunk, id_ranges};
pub use dispatcher::{
    ActionError, DispatchOptions, DispatchReport, Dispatcher, EnqueueError, RangeDispatchReport,
    RangeDispatcher, RecordAction,
};
pub use queue::{
    BackoffStrategy, BatchTask, ChannelTaskQueue, PoolStats, QueueError, RetryPolicy, TaskId,
    TaskOutcome, TaskQueue, WorkerPool, WorkerPoolConfig, WorkerPoolHandle,
};
pub use record::ExpirableRecord;
pub use repository::{RecordRepository, RepositoryError};
pub use selector::{EligibilityPredicate, Selector, TimeWindow};
pub use watermark::{ResendPolicy, WatermarkDecision, WatermarkWriter};
