use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;

use super::{render, Notifier};
use crate::config::ChatSettings;
use crate::types::{Channel, EnrichedItem};

/// Slack incoming-webhook (or any endpoint taking the same JSON).
pub struct SlackNotifier {
    settings: ChatSettings,
    author: String,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
}

impl SlackNotifier {
    pub fn new(settings: ChatSettings, author: &str, timeout: Duration) -> Self {
        Self {
            settings,
            author: author.to_string(),
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    async fn send(&self, items: &[EnrichedItem]) -> Result<()> {
        let text = render::chat_text(items, &self.author, Utc::now());
        let body = SlackPayload {
            text: &text,
            username: &self.settings.username,
            icon_emoji: &self.settings.icon_emoji,
        };

        tracing::info!(target: "notify", "💬 Sending Slack alert...");
        let rsp = self
            .client
            .post(&self.settings.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?;

        let status = rsp.status();
        if !status.is_success() {
            let detail = rsp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "HTTP {}: {}",
                status.as_u16(),
                detail.trim().chars().take(300).collect::<String>()
            ));
        }
        Ok(())
    }
}
