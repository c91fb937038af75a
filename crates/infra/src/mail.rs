//! Mail backends.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use lmsops_core::{EmailMessage, MailError, Mailer};

use crate::config::{MailBackend, MailSettings};

/// Logs messages instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to.clone()));
        }
        info!(
            to = %message.to,
            template = %message.template,
            context = %message.context,
            "email queued for delivery"
        );
        Ok(())
    }
}

/// Writes each message as a JSON file for an external relay to pick up.
#[derive(Debug, Clone)]
pub struct SpoolMailer {
    dir: PathBuf,
}

impl SpoolMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, MailError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| MailError::Transport(format!("cannot create spool {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Mailer for SpoolMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to.clone()));
        }
        let body = serde_json::to_vec_pretty(message)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        let name = format!(
            "{}-{}.json",
            message.created_at.format("%Y%m%dT%H%M%S"),
            Uuid::now_v7()
        );
        let path = self.dir.join(name);
        fs::write(&path, body)
            .map_err(|e| MailError::Transport(format!("cannot write {}: {e}", path.display())))
    }
}

pub fn build_mailer(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    Ok(match settings.backend {
        MailBackend::Log => Arc::new(LogMailer),
        MailBackend::Spool => Arc::new(SpoolMailer::new(&settings.spool_dir)?),
    })
}
