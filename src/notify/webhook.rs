use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use super::{Notification, Notifier};

/// Posts a JSON document per notification to a generic HTTP endpoint
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
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(rule = %notification.rule_id))]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let payload = json!({
            "message": notification.body,
            "subject": notification.subject,
            "severity": notification.severity,
            "rule_id": notification.rule_id,
            "device_id": notification.device_id,
            "ip_address": notification.ip_address,
            "value": notification.value,
            "timestamp": notification.timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("failed to send webhook alert")?;

        let status = response.status();
        if !status.is_success() {
            bail!("webhook alert failed with status: {status}");
        }

        debug!("successfully sent webhook alert");
        Ok(())
    }
}
