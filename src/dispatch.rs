//! Background delivery of notifications, off the request path.

use crate::notifier::{Notification, Notifier, NotifyError};
use crate::state_actor::{StatusLogError, StatusLogHandle};
use crate::{NotificationOutcome, StatusRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

/// How often, and how patiently, a notification is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Growth factor applied to the delay after every further failure.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay after `attempts` failed attempts: `base_delay * multiplier^(attempts - 1)`,
    /// saturating at `Duration::MAX`.
    #[must_use]
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

struct Job {
    id: u64,
    notification: Notification,
}

/// Hands notifications to the dispatcher task without waiting for delivery.
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    sender: Option<mpsc::Sender<Job>>,
    log: StatusLogHandle,
}

impl NotificationQueue {
    /// A queue that drops everything. Used when mail is not configured.
    #[must_use]
    pub fn disabled(log: StatusLogHandle) -> Self {
        Self { sender: None, log }
    }

    /// Spawns the dispatcher. Outcomes are written back to `log`.
    #[must_use]
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        log: StatusLogHandle,
        policy: RetryPolicy,
        attempt_timeout: Duration,
        capacity: usize,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
        let outcomes = log.clone();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let outcome =
                    deliver(notifier.as_ref(), &job.notification, &policy, attempt_timeout).await;
                if let Err(e) = outcomes.set_notification(job.id, outcome).await {
                    error!(error = %e, "Dropping notification outcome");
                    break;
                }
            }
        });

        Self {
            sender: Some(sender),
            log,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues the status change mail for `record`. A full or stopped queue
    /// fails the notification immediately instead of waiting.
    pub async fn enqueue(&self, record: &StatusRecord) -> Result<(), StatusLogError> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };

        let job = Job {
            id: record.id,
            notification: Notification::status_changed(record),
        };
        let reason = match sender.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => "notification queue is full",
            Err(TrySendError::Closed(_)) => "notifier is not running",
        };

        warn!(id = record.id, reason, "Notification not queued");
        self.log
            .set_notification(
                record.id,
                NotificationOutcome::Failed {
                    attempts: 0,
                    reason: reason.to_string(),
                },
            )
            .await?;
        Ok(())
    }
}

/// Tries to send `notification` until it succeeds or `policy` is exhausted.
pub async fn deliver(
    notifier: &dyn Notifier,
    notification: &Notification,
    policy: &RetryPolicy,
    attempt_timeout: Duration,
) -> NotificationOutcome {
    let mut attempts = 1;
    loop {
        let result = tokio::time::timeout(attempt_timeout, notifier.send(notification))
            .await
            .unwrap_or(Err(NotifyError::Timeout(attempt_timeout)));

        match result {
            Ok(()) => {
                info!(subject = %notification.subject, attempts, "Notification delivered");
                return NotificationOutcome::Delivered { attempts };
            }
            Err(e) if attempts < policy.max_attempts => {
                let delay = policy.next_delay(attempts);
                warn!(error = %e, attempts, ?delay, "Notification failed, retrying");
                tokio::time::sleep(delay).await;
                attempts += 1;
            }
            Err(e) => {
                error!(error = %e, attempts, "Giving up on notification");
                return NotificationOutcome::Failed {
                    attempts,
                    reason: e.to_string(),
                };
            }
        }
    }
}
