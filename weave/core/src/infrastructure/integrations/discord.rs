// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Discord Chat Adapter
//!
//! Posts one embed per notification to an incoming webhook.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::Level;

use super::http;
use crate::domain::integration::{ChatNotifier, Integration, IntegrationError, IntegrationKind, Notification};
use crate::domain::weave_config::{resolve_secret, DiscordConfig};

const NAME: &str = "Discord";

/// Embed colour when the notification does not choose one.
pub const DEFAULT_COLOR: u32 = 0x9B59B6;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    username: &'a str,
    embeds: Vec<Embed<'a>>,
}

#[derive(Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage<'a>>,
    footer: EmbedFooter,
}

#[derive(Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct EmbedImage<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct EmbedFooter {
    text: String,
}

pub struct DiscordIntegration {
    config: DiscordConfig,
    client: reqwest::Client,
    webhook_url: OnceLock<String>,
}

impl DiscordIntegration {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: http::client(),
            webhook_url: OnceLock::new(),
        }
    }

    fn message<'a>(&'a self, notification: &'a Notification) -> WebhookMessage<'a> {
        let fields = notification
            .metric
            .map(|metric| {
                vec![EmbedField {
                    name: "Coherence".to_string(),
                    value: format!("{:.1}%", metric),
                    inline: true,
                }]
            })
            .unwrap_or_default();

        WebhookMessage {
            username: &self.config.username,
            embeds: vec![Embed {
                title: &notification.title,
                description: &notification.body,
                color: notification.color.unwrap_or(DEFAULT_COLOR),
                timestamp: Utc::now().to_rfc3339(),
                fields,
                image: notification.image_url.as_deref().map(|url| EmbedImage { url }),
                footer: EmbedFooter {
                    text: "The Weave".to_string(),
                },
            }],
        }
    }
}

#[async_trait]
impl Integration for DiscordIntegration {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Chat
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        let webhook_url = resolve_secret(&self.config.webhook_url)
            .ok_or_else(|| IntegrationError::configuration(NAME, "DISCORD_WEBHOOK_URL is not set"))?;

        url::Url::parse(&webhook_url).map_err(|e| {
            IntegrationError::configuration(NAME, format!("invalid webhook URL: {}", e))
        })?;

        let _ = self.webhook_url.set(webhook_url);
        self.log(Level::INFO, "Webhook ready");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        Ok(())
    }
}

#[async_trait]
impl ChatNotifier for DiscordIntegration {
    async fn notify(&self, notification: &Notification) -> Result<(), IntegrationError> {
        let webhook_url = self
            .webhook_url
            .get()
            .ok_or_else(|| IntegrationError::NotInitialized(NAME.to_string()))?;

        let response = self
            .client
            .post(webhook_url)
            .json(&self.message(notification))
            .send()
            .await?;

        http::check(NAME, response).await?;
        self.log(Level::DEBUG, &format!("Posted: {}", notification.title));
        Ok(())
    }
}
