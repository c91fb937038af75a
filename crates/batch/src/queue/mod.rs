//! Task queue and worker pool for range batches.
//!
//! ## Design
//!
//! - A batch is handed off as a `BatchTask` (range + log id), never as records
//! - Submission goes through the `TaskQueue` trait; the in-process
//!   implementation is a std `mpsc` channel
//! - A `WorkerPool` drains the channel on N threads and routes tasks to named handlers
//! - Transient failures are retried in place according to a `RetryPolicy`
//!
//! Handlers must be idempotent: a task can run more than once, and tasks from
//! the same run complete in any order.

pub mod pool;
pub mod types;

pub use pool::{ChannelTaskQueue, PoolStats, TaskHandler, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
pub use types::{BackoffStrategy, BatchTask, QueueError, RetryPolicy, TaskId, TaskOutcome, TaskQueue};
