//! Fire-and-forget notification sinks

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Payload sent when a message lands in the interesting category
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationEvent {
    pub subject: String,
    pub from: String,
    pub account: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver one event. Best effort; the engine never retries.
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Send an event to every sink. Failures are logged and swallowed; one
/// sink's failure never blocks another's delivery.
pub async fn notify_all(notifiers: &[std::sync::Arc<dyn Notifier>], event: &NotificationEvent) {
    for notifier in notifiers {
        match notifier.notify(event).await {
            Ok(()) => debug!(
                notifier = notifier.name(),
                subject = %event.subject,
                "Notification delivered"
            ),
            Err(e) => warn!(
                notifier = notifier.name(),
                subject = %event.subject,
                "Notification failed: {}",
                e
            ),
        }
    }
}

/// Chat notifier posting to a Slack-style incoming webhook
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let payload = json!({
            "text": format!(
                "New interested email on {}\n*From:* {}\n*Subject:* {}",
                event.account, event.from, event.subject
            )
        });

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::Notification(format!("slack request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Notification(format!(
                "slack webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Generic webhook sink posting the structured event as JSON
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| SyncError::Notification(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_notify_all_is_independent() {
        let mut failing = MockNotifier::new();
        failing.expect_name().return_const("failing");
        failing
            .expect_notify()
            .times(1)
            .returning(|_| Err(SyncError::Notification("boom".to_string())));

        let mut working = MockNotifier::new();
        working.expect_name().return_const("working");
        working.expect_notify().times(1).returning(|_| Ok(()));

        let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(failing), Arc::new(working)];
        let event = NotificationEvent {
            subject: "s".to_string(),
            from: "f".to_string(),
            account: "a".to_string(),
        };

        // The failing sink must not stop the working one; both are invoked
        notify_all(&notifiers, &event).await;
    }
}
