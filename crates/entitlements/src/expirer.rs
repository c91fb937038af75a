//! The per-range expiration task.

use tracing::{error, info};

use lmsops_batch::{BatchRange, BatchTask, RepositoryError, TaskOutcome};
use lmsops_core::Clock;

use crate::entitlement::ExpirationPolicy;
use crate::repository::EntitlementRepository;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationSummary {
    pub examined: usize,
    pub expired: usize,
}

/// Applies the expiration policy to one id range.
///
/// Only unexpired rows are loaded, so re-running a range is a no-op for
/// everything it already expired.
#[derive(Debug, Clone)]
pub struct EntitlementExpirer<R, C> {
    repository: R,
    policy: ExpirationPolicy,
    clock: C,
}

impl<R: EntitlementRepository, C: Clock> EntitlementExpirer<R, C> {
    pub fn new(repository: R, policy: ExpirationPolicy, clock: C) -> Self {
        Self {
            repository,
            policy,
            clock,
        }
    }

    pub fn expire_range(&self, range: BatchRange, log_id: &str) -> Result<ExpirationSummary, RepositoryError> {
        info!(
            "Entitlement Expiration Task {}: Starting, examining entitlements with ids in {}",
            log_id, range
        );

        let entitlements = self.repository.unexpired_in_range(range)?;
        let now = self.clock.now();
        let mut summary = ExpirationSummary {
            examined: entitlements.len(),
            ..Default::default()
        };

        for entitlement in entitlements
            .iter()
            .filter(|e| self.policy.is_past_expiration(e, now))
        {
            if self.repository.mark_expired(entitlement.id, now)? {
                summary.expired += 1;
            }
        }

        info!(
            expired = summary.expired,
            "Successfully completed the task {} after examining {} entries", log_id, summary.examined
        );
        Ok(summary)
    }

    /// Worker-pool adapter: storage failures are reported as retryable.
    pub fn handle(&self, task: &BatchTask) -> TaskOutcome {
        match self.expire_range(task.range, &task.log_id) {
            Ok(summary) => TaskOutcome::Success {
                examined: summary.examined,
            },
            Err(RepositoryError::Storage(reason)) => {
                error!(
                    log_id = %task.log_id,
                    "Failed to expire entitlements that reached their expiration period: {}",
                    reason
                );
                TaskOutcome::Retry(reason)
            }
            Err(err) => TaskOutcome::Failure(err.to_string()),
        }
    }
}
