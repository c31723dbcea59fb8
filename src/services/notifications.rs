//! Outbound notifications.
//!
//! Services push a [`Notification`] through a [`Notifier`]; a background
//! [`NotificationWorker`] hands each one to a [`Mailer`]. Enqueueing never
//! blocks and delivery failures are logged and dropped, so a slow or broken
//! mail transport cannot affect an issue or return.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::AppResult;

/// A message for one recipient
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    LoanIssued {
        to: String,
        name: String,
        title: String,
        copy_number: String,
        due_at: DateTime<Utc>,
    },
    LoanReturned {
        to: String,
        name: String,
        title: String,
        copy_number: String,
        fine: Decimal,
    },
    TitleAvailable {
        to: String,
        name: String,
        title: String,
        author: String,
    },
    Broadcast {
        to: String,
        name: String,
        message: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::LoanIssued { to, .. }
            | Notification::LoanReturned { to, .. }
            | Notification::TitleAvailable { to, .. }
            | Notification::Broadcast { to, .. } => to,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::LoanIssued { title, .. } => format!("Book issued: {}", title),
            Notification::LoanReturned { title, .. } => format!("Book returned: {}", title),
            Notification::TitleAvailable { title, .. } => format!("Now available: {}", title),
            Notification::Broadcast { .. } => "Message from the library".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::LoanIssued {
                name,
                title,
                copy_number,
                due_at,
                ..
            } => format!(
                "Dear {name},\n\nCopy {copy_number} of \"{title}\" has been issued to you.\nPlease return it by {}.\n",
                due_at.format("%Y-%m-%d")
            ),
            Notification::LoanReturned {
                name,
                title,
                copy_number,
                fine,
                ..
            } => {
                let mut body = format!(
                    "Dear {name},\n\nWe have received copy {copy_number} of \"{title}\". Thank you.\n"
                );
                if !fine.is_zero() {
                    body.push_str(&format!(
                        "A fine of {} was added to your account for the late return.\n",
                        fine
                    ));
                }
                body
            }
            Notification::TitleAvailable {
                name,
                title,
                author,
                ..
            } => format!(
                "Dear {name},\n\n\"{title}\" by {author}, which you requested, is now available at the library.\n"
            ),
            Notification::Broadcast { name, message, .. } => {
                format!("Dear {name},\n\n{message}\n")
            }
        }
    }
}

/// Delivery transport for notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Mailer used when email delivery is disabled
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        tracing::info!(to, subject, "Email disabled, notification not sent");
        Ok(())
    }
}

/// Sending half of the notification queue
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier and the worker that delivers its messages through `mailer`
    pub fn channel(mailer: Arc<dyn Mailer>) -> (Notifier, NotificationWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx }, NotificationWorker { rx, mailer })
    }

    /// Queue a notification; never fails the caller
    pub fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::warn!(
                "Notification worker is not running, dropping message to {}",
                e.0.recipient()
            );
        }
    }
}

/// Receiving half of the notification queue
pub struct NotificationWorker {
    rx: mpsc::UnboundedReceiver<Notification>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationWorker {
    /// Run on the tokio runtime until every `Notifier` is dropped
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
        }
        tracing::debug!("Notification queue closed");
    }

    /// Deliver everything currently queued; returns how many were attempted
    pub async fn flush(&mut self) -> usize {
        let mut attempted = 0;
        while let Ok(notification) = self.rx.try_recv() {
            self.deliver(&notification).await;
            attempted += 1;
        }
        attempted
    }

    async fn deliver(&self, notification: &Notification) {
        let to = notification.recipient();
        match self
            .mailer
            .send(to, &notification.subject(), &notification.body())
            .await
        {
            Ok(()) => tracing::debug!("Notification sent to {}", to),
            Err(e) => tracing::warn!("Failed to send notification to {}: {}", to, e),
        }
    }
}
