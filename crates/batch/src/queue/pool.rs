//! In-process worker pool fed by a channel task queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use tracing::{debug, error, info, warn};

use super::types::{BatchTask, QueueError, RetryPolicy, TaskId, TaskOutcome, TaskQueue};

/// Task handler function type.
pub type TaskHandler = Box<dyn Fn(&BatchTask) -> TaskOutcome + Send + Sync>;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Thread name prefix, also used in logs
    pub name: String,
    pub retry: RetryPolicy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            name: "batch-worker".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Pool runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub tasks_processed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub retries: u64,
    pub rows_examined: u64,
}

/// Channel-backed `TaskQueue`.
///
/// Owned by the `WorkerPoolHandle`; dropping it is what lets workers drain and exit.
#[derive(Debug)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<BatchTask>,
}

impl TaskQueue for ChannelTaskQueue {
    fn submit(&self, task: BatchTask) -> Result<TaskId, QueueError> {
        let id = task.id;
        self.sender.send(task).map_err(|_| QueueError::Closed)?;
        Ok(id)
    }
}

/// Handle to a running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    queue: ChannelTaskQueue,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<PoolStats>>,
}

impl WorkerPoolHandle {
    pub fn queue(&self) -> &ChannelTaskQueue {
        &self.queue
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Close the queue, let workers finish what was submitted, and join them.
    pub fn shutdown(self) -> PoolStats {
        let WorkerPoolHandle { queue, joins, stats } = self;
        drop(queue);
        for join in joins {
            let _ = join.join();
        }
        stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Named task handlers executed by worker threads.
pub struct WorkerPool {
    handlers: HashMap<String, TaskHandler>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for tasks named `name`.
    pub fn register_handler<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&BatchTask) -> TaskOutcome + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Run one task to completion, retrying in place.
    ///
    /// Returns the final outcome and the number of retries used.
    pub fn execute(&self, task: &BatchTask, retry: &RetryPolicy) -> (TaskOutcome, u32) {
        let Some(handler) = self.handlers.get(&task.name) else {
            let error = format!("no handler for task: {}", task.name);
            warn!(task_id = %task.id, error = %error, "no handler for task");
            return (TaskOutcome::Failure(error), 0);
        };

        let mut retries = 0;
        loop {
            match handler(task) {
                TaskOutcome::Retry(reason) if retry.should_retry(retries) => {
                    retries += 1;
                    let delay = retry.delay_for_retry(retries);
                    warn!(
                        task_id = %task.id,
                        log_id = %task.log_id,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "task failed, retrying"
                    );
                    thread::sleep(delay);
                }
                TaskOutcome::Retry(reason) => return (TaskOutcome::Failure(reason), retries),
                outcome => return (outcome, retries),
            }
        }
    }

    /// Spawn `config.workers` threads consuming a fresh channel.
    pub fn spawn(self, config: WorkerPoolConfig) -> Result<WorkerPoolHandle, QueueError> {
        let (sender, receiver) = mpsc::channel::<BatchTask>();
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(Mutex::new(PoolStats::default()));
        let pool = Arc::new(self);
        let retry = Arc::new(config.retry.clone());

        let mut joins = Vec::with_capacity(config.workers.max(1));
        for n in 0..config.workers.max(1) {
            let name = format!("{}-{}", config.name, n);
            let pool = pool.clone();
            let receiver = receiver.clone();
            let stats = stats.clone();
            let retry = retry.clone();
            let thread_name = name.clone();

            let join = thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(&name, &pool, &receiver, &retry, &stats))
                .map_err(|e| QueueError::Spawn(e.to_string()))?;
            joins.push(join);
        }

        info!(pool = %config.name, workers = joins.len(), "worker pool started");

        Ok(WorkerPoolHandle {
            queue: ChannelTaskQueue { sender },
            joins,
            stats,
        })
    }
}

fn worker_loop(
    name: &str,
    pool: &WorkerPool,
    receiver: &Mutex<mpsc::Receiver<BatchTask>>,
    retry: &RetryPolicy,
    stats: &Mutex<PoolStats>,
) {
    loop {
        let next = match receiver.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };

        // Disconnected: the queue was dropped and fully drained.
        let Ok(task) = next else { break };

        debug!(worker = name, task_id = %task.id, task = %task.name, range = %task.range, "claimed task");
        let (outcome, retries) = pool.execute(&task, retry);

        if let Ok(mut s) = stats.lock() {
            s.tasks_processed += 1;
            s.retries += u64::from(retries);
            match &outcome {
                TaskOutcome::Success { examined } => {
                    s.tasks_succeeded += 1;
                    s.rows_examined += *examined as u64;
                }
                TaskOutcome::Retry(_) | TaskOutcome::Failure(_) => s.tasks_failed += 1,
            }
        }

        if let TaskOutcome::Failure(error) | TaskOutcome::Retry(error) = &outcome {
            error!(
                worker = name,
                task_id = %task.id,
                log_id = %task.log_id,
                error = %error,
                "task failed"
            );
        }
    }

    debug!(worker = name, "worker stopped");
}
