use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Notification, Notifier};

/// Writes notifications to the log in place of sending an e-mail
#[derive(Debug, Clone)]
pub struct LogNotifier {
    recipient: String,
}

impl LogNotifier {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    #[instrument(skip_all, fields(rule = %notification.rule_id))]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            "sending email to {}: {} | {}",
            self.recipient, notification.subject, notification.body
        );
        Ok(())
    }
}
