//! Outgoing email abstraction.
//!
//! Rendering is out of scope: a message carries a template name and a JSON
//! context, and the configured backend decides what to do with it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub template: String,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, template: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            to: to.into(),
            template: template.into(),
            context,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

impl<M: Mailer + ?Sized> Mailer for std::sync::Arc<M> {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        (**self).send(message)
    }
}

/// Collects messages instead of delivering them.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<EmailMessage>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mailer for InMemoryOutbox {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to.clone()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::Transport("outbox lock poisoned".to_string()))?;
        sent.push(message.clone());
        Ok(())
    }
}
