// src/config/mod.rs
//! Monitor configuration: optional TOML file, then environment overrides.
//! Built once at startup and passed explicitly into every component.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use ai::{AiSection, EnrichmentSettings};

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

pub const DEFAULT_FEED_URL: &str = "https://betting.betfair.com/index.xml";
pub const DEFAULT_AUTHOR: &str = "Rhys Williams";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; RSS Reader; +https://github.com/rhys-monitor)";
pub const DEFAULT_STATE_PATH: &str = "state/kv.json";
pub const DEFAULT_SEEN_KEY: &str = "seen_posts";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

fn d_feed_url() -> String {
    DEFAULT_FEED_URL.into()
}
fn d_author() -> String {
    DEFAULT_AUTHOR.into()
}
fn d_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn d_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}
fn d_seen_key() -> String {
    DEFAULT_SEEN_KEY.into()
}
fn d_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn d_smtp_host() -> String {
    DEFAULT_SMTP_HOST.into()
}
fn d_bot_name() -> String {
    format!("{DEFAULT_AUTHOR} Monitor")
}
fn d_icon() -> String {
    ":horse_racing:".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSection {
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Override recipient; defaults to `user`.
    pub to: Option<String>,
    #[serde(default = "d_smtp_host")]
    pub smtp_host: String,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            user: None,
            pass: None,
            to: None,
            smtp_host: d_smtp_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSection {
    pub webhook_url: Option<String>,
    #[serde(default = "d_bot_name")]
    pub username: String,
    #[serde(default = "d_icon")]
    pub icon_emoji: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: d_bot_name(),
            icon_emoji: d_icon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    #[serde(default = "d_feed_url")]
    pub feed_url: String,
    #[serde(default = "d_author")]
    pub author_name: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "d_seen_key")]
    pub seen_key: String,
    #[serde(default = "d_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub email: EmailSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub ai: AiSection,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            feed_url: d_feed_url(),
            author_name: d_author(),
            user_agent: d_user_agent(),
            state_path: d_state_path(),
            seen_key: d_seen_key(),
            http_timeout_secs: d_timeout(),
            email: EmailSection::default(),
            chat: ChatSection::default(),
            ai: AiSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub user: String,
    pub pass: String,
    pub to: String,
    pub smtp_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub webhook_url: String,
    pub username: String,
    pub icon_emoji: String,
}

/// Channels with enough configuration to be attempted. Resolved once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledChannels {
    pub email: Option<EmailSettings>,
    pub chat: Option<ChatSettings>,
}

impl EnabledChannels {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.chat.is_none()
    }
}

impl MonitorConfig {
    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH (must exist)
    /// 2) config/monitor.toml (optional)
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::from_file(&pb)?
            }
            Err(_) => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::from_file(p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing monitor config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: MonitorConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// Environment wins over the file. Empty values are ignored.
    pub fn apply_env(&mut self) {
        fn var(name: &str) -> Option<String> {
            env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        if let Some(v) = var("FEED_URL") {
            self.feed_url = v;
        }
        if let Some(v) = var("AUTHOR_NAME") {
            self.author_name = v;
        }
        if let Some(v) = var("USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = var("STATE_PATH") {
            self.state_path = PathBuf::from(v);
        }
        if let Some(v) = var("SEEN_KEY") {
            self.seen_key = v;
        }
        if let Some(v) = var("HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.http_timeout_secs = v;
        }
        if let Some(v) = var("EMAIL_USER") {
            self.email.user = Some(v);
        }
        if let Some(v) = var("EMAIL_PASS") {
            self.email.pass = Some(v);
        }
        if let Some(v) = var("EMAIL_TO") {
            self.email.to = Some(v);
        }
        if let Some(v) = var("SMTP_HOST") {
            self.email.smtp_host = v;
        }
        if let Some(v) = var("SLACK_WEBHOOK") {
            self.chat.webhook_url = Some(v);
        }
        self.ai.apply_env();
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn enabled_channels(&self) -> EnabledChannels {
        let nonempty = |o: &Option<String>| {
            o.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let email = match (nonempty(&self.email.user), nonempty(&self.email.pass)) {
            (Some(user), Some(pass)) => Some(EmailSettings {
                to: nonempty(&self.email.to).unwrap_or_else(|| user.clone()),
                user,
                pass,
                smtp_host: self.email.smtp_host.clone(),
            }),
            _ => None,
        };

        let chat = nonempty(&self.chat.webhook_url).map(|webhook_url| ChatSettings {
            webhook_url,
            username: self.chat.username.clone(),
            icon_emoji: self.chat.icon_emoji.clone(),
        });

        EnabledChannels { email, chat }
    }

    pub fn enrichment(&self) -> Option<EnrichmentSettings> {
        self.ai.resolve()
    }
}
