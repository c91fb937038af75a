//! Settings file for the `lmsops` commands.
//!
//! Every section is optional; a missing file, section or field falls back to
//! the defaults below. Each component receives its own section explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lmsops_batch::{BackoffStrategy, RetryPolicy, WorkerPoolConfig};
use lmsops_entitlements::{DEFAULT_BATCH_SIZE, ExpirationPolicy};
use lmsops_observability::LogConfig;
use lmsops_verification::ExpiryEmailSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub logging: LogConfig,
    pub task_queue: TaskQueueSettings,
    pub mail: MailSettings,
    pub catalog: CatalogSettings,
    pub entitlements: EntitlementSettings,
    pub verification_expiry_email: ExpiryEmailSettings,
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(data)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.verification_expiry_email
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("verification_expiry_email: {err}")))?;
        if self.task_queue.workers == 0 {
            return Err(ConfigError::Invalid("task_queue.workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Overridden by `--database-url` / `DATABASE_URL`.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskQueueSettings {
    pub workers: usize,
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff: BackoffStrategy,
}

impl Default for TaskQueueSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            workers: 4,
            max_retries: retry.max_retries,
            base_delay_secs: retry.base_delay.as_secs(),
            max_delay_secs: retry.max_delay.as_secs(),
            backoff: retry.strategy,
        }
    }
}

impl TaskQueueSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            strategy: self.backoff,
        }
    }

    pub fn pool_config(&self, name: &str) -> WorkerPoolConfig {
        WorkerPoolConfig::default()
            .with_name(name)
            .with_workers(self.workers)
            .with_retry_policy(self.retry_policy())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Log every message instead of delivering it.
    #[default]
    Log,
    /// Write every message as a JSON file into `spool_dir`.
    Spool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub backend: MailBackend,
    pub spool_dir: PathBuf,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            backend: MailBackend::Log,
            spool_dir: PathBuf::from("mail-spool"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON export of the discovery catalog's course runs.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementSettings {
    #[serde(flatten)]
    pub policy: ExpirationPolicy,
    pub batch_size: usize,
}

impl Default for EntitlementSettings {
    fn default() -> Self {
        Self {
            policy: ExpirationPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.verification_expiry_email.resend_days, 15);
        assert_eq!(settings.entitlements.batch_size, 10_000);
        assert_eq!(settings.task_queue.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  url: postgres://lms@localhost/lms\n\
             entitlements:\n  expiration_period_days: 365\n\
             verification_expiry_email:\n  default_emails: 3\n\
             mail:\n  backend: spool\n  spool_dir: /tmp/outbox"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.database.url.as_deref(), Some("postgres://lms@localhost/lms"));
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(settings.entitlements.policy.expiration_period_days, 365);
        assert_eq!(settings.entitlements.policy.regain_period_days, 14);
        assert_eq!(settings.verification_expiry_email.default_emails, 3);
        assert_eq!(settings.verification_expiry_email.days_range, 1);
        assert_eq!(settings.mail.backend, MailBackend::Spool);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Settings::from_yaml("\n").unwrap(), Settings::default());
    }

    #[test]
    fn rejects_zero_default_emails() {
        let err = Settings::from_yaml("verification_expiry_email:\n  default_emails: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_a_single_reminder() {
        let err = Settings::from_yaml("verification_expiry_email:\n  default_emails: 1\n").unwrap_err();
        assert!(err.to_string().contains("verification_expiry_email"));
    }

    #[test]
    fn rejects_a_range_reaching_the_last_reminder() {
        let yaml = "verification_expiry_email:\n  resend_days: 3\n  days_range: 3\n";
        assert!(matches!(Settings::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn pool_config_carries_retry_settings() {
        let queue = TaskQueueSettings {
            workers: 2,
            max_retries: 3,
            base_delay_secs: 5,
            ..Default::default()
        };
        let config = queue.pool_config("expire");
        assert_eq!(config.workers, 2);
        assert_eq!(config.name, "expire");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay_for_retry(1), Duration::from_secs(5));
    }
}
