//! Delivery of alert notifications
//!
//! The alert engine hands every triggered rule to a [`Notifier`]. Which
//! implementation is used is decided by the `notifier` config section.

pub mod discord;
pub mod log;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::NotifierConfig;
use crate::model::Metric;
use crate::rules::{Severity, Violation};

pub use self::discord::DiscordNotifier;
pub use self::log::LogNotifier;
pub use self::webhook::WebhookNotifier;

/// One triggered rule for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub rule_id: String,
    pub device_id: String,
    pub device_name: String,
    pub ip_address: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_violation(violation: &Violation<'_>, metric: &Metric) -> Self {
        Self {
            subject: violation.subject(),
            body: violation.message(metric),
            severity: violation.rule.severity,
            rule_id: violation.rule.id.clone(),
            device_id: metric.device_id.clone(),
            device_name: metric.display_name().to_string(),
            ip_address: metric.ip_address.to_string(),
            value: violation.value,
            timestamp: metric.timestamp,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Build the notifier selected in the configuration
pub fn from_config(config: &NotifierConfig) -> Box<dyn Notifier> {
    match config {
        NotifierConfig::Log(target) => Box::new(LogNotifier::new(target.recipient.clone())),
        NotifierConfig::Webhook(webhook) => Box::new(WebhookNotifier::new(webhook.url.clone())),
        NotifierConfig::Discord(discord) => Box::new(DiscordNotifier::new(discord.clone())),
    }
}
