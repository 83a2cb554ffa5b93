//! Homework reminders.
//!
//! A background poller claims reports whose `homework_remind_at` has passed
//! and hands each to a [`ReminderNotifier`]. Claiming marks the reminder as
//! sent before delivery, so a reminder is delivered at most once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::domain::DueReminder;
use crate::store::{Store, StoreResult};

/// Reminders claimed per poll.
pub const DEFAULT_REMINDER_BATCH: i64 = 50;

/// Reminder delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Reminder webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Reminder webhook failed: {status} {body}")]
    Status { status: StatusCode, body: String },
}

/// Delivers a claimed reminder.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn notify(&self, reminder: &DueReminder) -> Result<(), NotifyError>;
}

/// Writes reminders to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ReminderNotifier for LogNotifier {
    async fn notify(&self, reminder: &DueReminder) -> Result<(), NotifyError> {
        info!(
            report_id = %reminder.report_id,
            owner_id = %reminder.owner_id,
            client = %reminder.client_name,
            homework = %reminder.homework,
            "homework reminder due"
        );
        Ok(())
    }
}

/// POSTs each reminder as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReminderNotifier for WebhookNotifier {
    async fn notify(&self, reminder: &DueReminder) -> Result<(), NotifyError> {
        let resp = self.client.post(&self.url).json(reminder).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(NotifyError::Status { status, body });
        }
        Ok(())
    }
}

/// Claims due reminders and delivers them.
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn ReminderNotifier>,
    batch_size: i64,
}

impl ReminderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn ReminderNotifier>) -> Self {
        Self {
            store,
            notifier,
            batch_size: DEFAULT_REMINDER_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run one scan at `now`. Returns the number of reminders delivered.
    ///
    /// Delivery failures are logged and not retried.
    pub async fn run_once(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let due = self.store.claim_due_reminders(now, self.batch_size).await?;
        let mut delivered = 0;
        for reminder in &due {
            match self.notifier.notify(reminder).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(report_id = %reminder.report_id, "reminder delivery failed: {e}"),
            }
        }
        if !due.is_empty() {
            debug!(claimed = due.len(), delivered, "reminder scan complete");
        }
        Ok(delivered)
    }

    /// Poll every `interval` until `cancel` fires.
    pub fn spawn_poller(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("reminder poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            warn!("reminder scan failed: {e}");
                        }
                    }
                }
            }
        })
    }
}
