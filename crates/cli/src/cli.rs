use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lmsops_observability::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "lmsops",
    about = "LMS maintenance commands: entitlement expiry, verification reminders, course sync",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(long, global = true, env = "LMSOPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Postgres connection string; overrides `database.url`
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Log output: json, pretty or compact; overrides `logging.format`
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true, short = 'j')]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Expire course entitlements whose expiration period has passed
    ExpireOldEntitlements(ExpireArgs),

    /// Email learners whose photo verification has expired
    SendVerificationExpiryEmail(ExpiryEmailArgs),

    /// Create every catalog course run, granting INSTRUCTOR access
    SyncCourses(SyncArgs),

    /// Apply the bundled database schema
    Migrate,
}

#[derive(Debug, Clone, Args)]
pub struct ExpireArgs {
    /// Enqueue the expiration tasks; without it only the batch count is reported
    #[arg(short = 'c', long)]
    pub commit: bool,

    /// Entitlements per task; overrides `entitlements.batch_size`
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Worker threads consuming the tasks; overrides `task_queue.workers`
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct ExpiryEmailArgs {
    /// Verifications per batch
    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,

    /// Seconds to sleep between batches
    #[arg(long, default_value_t = 10)]
    pub sleep_time: u64,

    /// Count the learners without sending email or updating anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Instructor user id or email address
    pub instructor: String,

    /// Catalog export (JSON); overrides `catalog.path`
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}
