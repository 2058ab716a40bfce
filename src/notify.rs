//! Notification side channel
//!
//! The toast/notification service lives outside this crate. The coordinator
//! hands it a title and body through `Notifier`, fire-and-forget: delivery
//! runs in its own task, failures are logged and never retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// One user-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Notification service unavailable: {0}")]
    Unavailable(String),
}

/// Delivers notifications to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log; used when no notification service is wired in
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!("{}: {}", notification.title, notification.body);
        Ok(())
    }
}

/// Deliver in the background. The returned handle is only useful to tests.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let id = notification.id;
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!("Failed to deliver notification {}: {}", id, e);
        }
    })
}
