//! Discord webhook notifications rendered as embeds

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};

use super::{Notification, Notifier};
use crate::config::Discord;
use crate::rules::Severity;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

pub fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 15158332, // Red
        Severity::Warning => 15105570,  // Orange
        Severity::Info => 5793266,      // Light blue
    }
}

#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    discord: Discord,
}

impl DiscordNotifier {
    pub fn new(discord: Discord) -> Self {
        Self {
            client: Client::new(),
            discord,
        }
    }

    pub fn build_embed(&self, notification: &Notification) -> Embed {
        let title = match notification.severity {
            Severity::Critical => "🔴 Critical Alert",
            Severity::Warning => "⚠️ Warning",
            Severity::Info => "ℹ️ Notice",
        };

        Embed {
            title: Some(title.to_string()),
            description: Some(notification.body.clone()),
            color: Some(severity_color(notification.severity)),
            fields: vec![
                EmbedField {
                    name: "📟 Device".to_string(),
                    value: format!("{} ({})", notification.device_name, notification.ip_address),
                    inline: true,
                },
                EmbedField {
                    name: "📊 Value".to_string(),
                    value: format!("{:.2}", notification.value),
                    inline: true,
                },
            ],
            footer: Some(EmbedFooter {
                text: format!("Rule: {}", notification.rule_id),
            }),
            timestamp: Some(notification.timestamp.to_rfc3339()),
        }
    }

    pub fn build_message(&self, notification: &Notification) -> Message {
        let mut builder = MessageBuilder::new();
        if let Some(user_id) = &self.discord.user_id {
            builder = builder.content(format!("<@{user_id}> {}", notification.subject));
        }
        builder.add_embed(self.build_embed(notification)).build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip_all, fields(rule = %notification.rule_id))]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let message = self.build_message(notification);

        let response = self
            .client
            .post(&self.discord.url)
            .json(&message)
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {error_text}");
            }
            bail!("Discord message failed with status: {status}");
        }

        debug!("successfully sent Discord message");
        Ok(())
    }
}
