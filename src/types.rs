// src/types.rs
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A feed entry that passed the author filter, not yet checked against history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub title: String,
    pub link: String, // natural key, compared verbatim
    #[serde(rename = "date")]
    pub published_at: DateTime<Utc>,
    pub author: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BetKind {
    #[serde(rename = "win")]
    Win,
    #[serde(rename = "each-way", alias = "each way", alias = "eachway", alias = "ew", alias = "e/w")]
    EachWay,
}

impl BetKind {
    pub fn label(self) -> &'static str {
        match self {
            BetKind::Win => "win",
            BetKind::EachWay => "each-way",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub subject_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub suggested_price: String,
    #[serde(default)]
    pub stake_units: String,
    pub bet_kind: BetKind,
}

/// Candidate plus whatever tips enrichment produced (often none).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

impl EnrichedItem {
    pub fn bare(item: CandidateItem) -> Self {
        Self {
            item,
            tips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Chat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => f.write_str("email"),
            Channel::Chat => f.write_str("chat"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "error")]
    pub error_detail: Option<String>,
}

impl NotificationOutcome {
    pub fn ok(channel: Channel) -> Self {
        Self {
            channel,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failed(channel: Channel, detail: impl Into<String>) -> Self {
        Self {
            channel,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// The only externally visible result of a run.
///
/// Field names follow the JSON the `/api/check` endpoint has always returned
/// (`success`, `newPosts`, `posts`, ...), so existing dashboards keep working.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(rename = "timestamp", with = "rfc3339")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "success")]
    pub succeeded: bool,
    #[serde(rename = "newPosts")]
    pub new_item_count: usize,
    #[serde(rename = "posts")]
    pub items: Vec<EnrichedItem>,
    pub message: String,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_sent: Option<bool>,
    #[serde(default)]
    pub notification_outcomes: Vec<NotificationOutcome>,
    #[serde(default)]
    pub seen_set_updated: bool,
}

impl RunReport {
    pub fn completed(
        started_at: DateTime<Utc>,
        author: &str,
        items: Vec<EnrichedItem>,
        notification_outcomes: Vec<NotificationOutcome>,
        seen_set_updated: bool,
    ) -> Self {
        let n = items.len();
        let message = if n > 0 {
            format!("Found {n} new {author} posts!")
        } else {
            format!("No new {author} posts")
        };
        let outcome_of = |ch: Channel| {
            notification_outcomes
                .iter()
                .find(|o| o.channel == ch)
                .map(|o| o.succeeded)
        };
        Self {
            started_at,
            succeeded: true,
            new_item_count: n,
            email_sent: outcome_of(Channel::Email),
            slack_sent: outcome_of(Channel::Chat),
            items,
            message,
            error_detail: None,
            notification_outcomes,
            seen_set_updated,
        }
    }

    pub fn failed(started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            started_at,
            succeeded: false,
            new_item_count: 0,
            items: Vec::new(),
            message: "Error occurred while checking RSS feed".to_string(),
            error_detail: Some(error.into()),
            email_sent: None,
            slack_sent: None,
            notification_outcomes: Vec::new(),
            seen_set_updated: false,
        }
    }

    pub fn outcome(&self, channel: Channel) -> Option<&NotificationOutcome> {
        self.notification_outcomes
            .iter()
            .find(|o| o.channel == channel)
    }
}

mod rfc3339 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
