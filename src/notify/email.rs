use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{render, Notifier};
use crate::config::EmailSettings;
use crate::types::{Channel, EnrichedItem};

/// SMTP relay with login credentials (Gmail app passwords by default).
pub struct EmailNotifier {
    settings: EmailSettings,
    author: String,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings, author: &str, timeout: Duration) -> Self {
        Self {
            settings,
            author: author.to_string(),
            timeout,
        }
    }

    /// One multipart/alternative message covering every item.
    pub fn build_message(&self, items: &[EnrichedItem], sent_at: DateTime<Utc>) -> Result<Message> {
        let from: Mailbox = self
            .settings
            .user
            .parse()
            .context("invalid sender address (EMAIL_USER)")?;
        let to: Mailbox = self
            .settings
            .to
            .parse()
            .context("invalid recipient address (EMAIL_TO)")?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(render::email_subject(&self.author, items.len()))
            .multipart(MultiPart::alternative_plain_html(
                render::email_text(items, &self.author, sent_at),
                render::email_html(items, &self.author, sent_at),
            ))
            .context("build email")
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, items: &[EnrichedItem]) -> Result<()> {
        let msg = self.build_message(items, Utc::now())?;

        let creds = Credentials::new(self.settings.user.clone(), self.settings.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.smtp_host)
            .with_context(|| format!("invalid SMTP host '{}'", self.settings.smtp_host))?
            .credentials(creds)
            .timeout(Some(self.timeout))
            .build();

        tracing::info!(target: "notify", to = %self.settings.to, "📧 Sending email alert...");
        mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
