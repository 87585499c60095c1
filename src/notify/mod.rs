// src/notify/mod.rs
pub mod email;
pub mod render;
pub mod slack;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use metrics::counter;

use crate::config::EnabledChannels;
use crate::types::{Channel, EnrichedItem, NotificationOutcome};

pub use email::EmailNotifier;
pub use slack::SlackNotifier;

/// One delivery mechanism. `send` reports failure through `Err`; the
/// dispatcher turns that into an outcome, never into a run failure.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;
    async fn send(&self, items: &[EnrichedItem]) -> Result<()>;
}

/// Fans a batch out to every configured channel at once.
#[derive(Clone, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Email first, chat second; unconfigured channels are simply absent.
    pub fn from_channels(channels: &EnabledChannels, author: &str, timeout: Duration) -> Self {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        match &channels.email {
            Some(s) => notifiers.push(Arc::new(EmailNotifier::new(s.clone(), author, timeout))),
            None => tracing::info!(target: "notify", "📧 Email not configured, skipping email alerts"),
        }
        match &channels.chat {
            Some(s) => notifiers.push(Arc::new(SlackNotifier::new(s.clone(), author, timeout))),
            None => tracing::info!(target: "notify", "💬 Slack not configured, skipping Slack alerts"),
        }
        Self { notifiers }
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// One outcome per configured channel, in configuration order.
    pub async fn dispatch(&self, items: &[EnrichedItem]) -> Vec<NotificationOutcome> {
        let sends = self.notifiers.iter().map(|n| async move {
            let ch = n.channel();
            match n.send(items).await {
                Ok(()) => {
                    tracing::info!(target: "notify", channel = %ch, items = items.len(), "✅ alert sent");
                    counter!("notify_sent_total", "channel" => ch.to_string()).increment(1);
                    NotificationOutcome::ok(ch)
                }
                Err(e) => {
                    let detail = format!("{e:#}");
                    tracing::warn!(target: "notify", channel = %ch, error = %detail, "❌ alert failed");
                    counter!("notify_failed_total", "channel" => ch.to_string()).increment(1);
                    NotificationOutcome::failed(ch, detail)
                }
            }
        });
        join_all(sends).await
    }
}
