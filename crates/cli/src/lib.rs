//! `lmsops` command-line front end.
//!
//! Settings come from the optional YAML file, then environment variables and
//! flags. The Postgres adapters are synchronous over a runtime owned by
//! [`run`], so commands execute on the calling thread.

pub mod app;
pub mod cli;

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use lmsops_core::SystemClock;
use lmsops_infra::{PgContext, Settings};

pub use app::{
    Backends, ExpireSummary, catalog_for, expire_old_entitlements, send_verification_expiry_email,
    sync_courses,
};
pub use cli::{Cli, Commands, ExpireArgs, ExpiryEmailArgs, SyncArgs};

/// Settings file plus command-line overrides.
pub fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = &cli.database_url {
        settings.database.url = Some(url.clone());
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    Ok(settings)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(&cli)?;
    lmsops_observability::init(&settings.logging);

    let url = settings
        .database
        .url
        .clone()
        .context("no database configured: pass --database-url or set DATABASE_URL")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let ctx = PgContext::connect(&url, settings.database.max_connections, runtime.handle().clone())
        .context("failed to connect to database")?;

    if let Commands::Migrate = cli.command {
        ctx.migrate()?;
        return Ok(());
    }

    let backends = Backends::postgres(&ctx, &settings, Arc::new(SystemClock))?;
    match &cli.command {
        Commands::ExpireOldEntitlements(args) => {
            emit(cli.json, &expire_old_entitlements(args, &settings, &backends)?)
        }
        Commands::SendVerificationExpiryEmail(args) => {
            emit(cli.json, &send_verification_expiry_email(args, &settings, &backends)?)
        }
        Commands::SyncCourses(args) => {
            let catalog = catalog_for(args, &settings)?;
            emit(cli.json, &sync_courses(args, catalog, &backends)?)
        }
        Commands::Migrate => Ok(()),
    }
}

fn emit<T: Serialize>(json: bool, summary: &T) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
