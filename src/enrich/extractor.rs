//! Structured tip extraction: provider abstraction + OpenAI implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EnrichmentSettings;
use crate::types::{BetKind, Tip};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "You extract horse racing betting tips from an article's HTML. \
Return ONLY a JSON object of the form {\"tips\": [{\"subjectName\": string, \"location\": string, \
\"time\": string, \"suggestedPrice\": string, \"stakeUnits\": string, \"betKind\": \"win\" | \"each-way\"}]}. \
subjectName is the horse, location the racecourse, time the race time as printed. \
If the article contains no tips, return {\"tips\": []}. No commentary.";

pub type ExtractFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Tip>>> + Send + 'a>>;

/// Turns an HTML fragment into tip records. Errors are the caller's to swallow.
pub trait TipExtractor: Send + Sync {
    fn extract<'a>(&'a self, html_fragment: &'a str) -> ExtractFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Build the production extractor for resolved settings.
pub fn build_extractor(settings: &EnrichmentSettings, timeout: Duration) -> Result<Arc<dyn TipExtractor>> {
    Ok(Arc::new(OpenAiExtractor::new(settings, timeout)?))
}

/// OpenAI chat-completions provider in JSON mode.
pub struct OpenAiExtractor {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiExtractor {
    pub fn new(settings: &EnrichmentSettings, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rhys-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout.max(Duration::from_secs(20)))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Point at a compatible endpoint (proxy, local stub).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    async fn extract_impl(&self, fragment: &str) -> Result<Vec<Tip>> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: fragment,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("openai returned HTTP {}: {}", status.as_u16(), truncate(&body, 300));
        }
        let body: Resp = resp.json().await.context("decoding openai response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("openai response had no content"))?;
        parse_tips_json(&content)
    }
}

impl TipExtractor for OpenAiExtractor {
    fn extract<'a>(&'a self, html_fragment: &'a str) -> ExtractFuture<'a> {
        Box::pin(self.extract_impl(html_fragment))
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Fixed answer for tests/local runs.
#[derive(Clone)]
pub struct MockExtractor {
    pub fixed: Result<Vec<Tip>, String>,
}

impl TipExtractor for MockExtractor {
    fn extract<'a>(&'a self, _html_fragment: &'a str) -> ExtractFuture<'a> {
        let out = self.fixed.clone().map_err(|e| anyhow!(e));
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Response parsing
// ------------------------------------------------------------

/// Lenient parse of model output. Accepts `{"tips": [...]}` or a bare array,
/// optionally wrapped in a ``` fence. Records without a subject or with an
/// unknown bet kind are dropped.
pub fn parse_tips_json(content: &str) -> Result<Vec<Tip>> {
    let trimmed = strip_code_fence(content);
    let v: Value = serde_json::from_str(trimmed).context("model output is not JSON")?;
    let records = match v {
        Value::Array(a) => a,
        Value::Object(mut o) => match o.remove("tips") {
            Some(Value::Array(a)) => a,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => bail!("'tips' is not an array: {other}"),
        },
        other => bail!("unexpected JSON shape: {other}"),
    };

    let mut tips = Vec::with_capacity(records.len());
    for r in records {
        match tip_from_value(&r) {
            Some(t) => tips.push(t),
            None => tracing::debug!(target: "enrich", record = %r, "dropping malformed tip record"),
        }
    }
    Ok(tips)
}

fn tip_from_value(v: &Value) -> Option<Tip> {
    let field = |names: &[&str]| -> String {
        names
            .iter()
            .find_map(|n| v.get(*n))
            .map(as_text)
            .unwrap_or_default()
    };

    let subject_name = field(&["subjectName", "horse", "name"]);
    if subject_name.is_empty() {
        return None;
    }
    let bet_kind = bet_kind_from(&field(&["betKind", "betType", "type"]))?;
    Some(Tip {
        subject_name,
        location: field(&["location", "course", "track"]),
        time: field(&["time", "raceTime"]),
        suggested_price: field(&["suggestedPrice", "price", "odds"]),
        stake_units: field(&["stakeUnits", "stake", "points"]),
        bet_kind,
    })
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn bet_kind_from(s: &str) -> Option<BetKind> {
    let k = s.trim().to_ascii_lowercase();
    if k.contains("each") || k == "ew" || k == "e/w" {
        Some(BetKind::EachWay)
    } else if k.contains("win") {
        Some(BetKind::Win)
    } else {
        None
    }
}

fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // drop an info string like ```json
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_object_with_loose_fields() {
        let out = parse_tips_json(
            r#"```json
{"tips":[
 {"subjectName":"Constitution Hill","location":"Cheltenham","time":"13:30","suggestedPrice":"4/6","stakeUnits":2,"betKind":"win"},
 {"horse":"Galopin Des Champs","course":"Leopardstown","odds":"11/4","stake":"1","betType":"Each Way"},
 {"subjectName":"","betKind":"win"},
 {"subjectName":"Mystery","betKind":"forecast"}
]}
```"#,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].stake_units, "2");
        assert_eq!(out[0].bet_kind, BetKind::Win);
        assert_eq!(out[1].subject_name, "Galopin Des Champs");
        assert_eq!(out[1].location, "Leopardstown");
        assert_eq!(out[1].bet_kind, BetKind::EachWay);
    }

    #[test]
    fn bare_array_and_empty_object_are_fine() {
        assert_eq!(
            parse_tips_json(r#"[{"subjectName":"A","betKind":"e/w"}]"#)
                .unwrap()
                .len(),
            1
        );
        assert!(parse_tips_json("{}").unwrap().is_empty());
    }

    #[test]
    fn prose_is_an_error() {
        assert!(parse_tips_json("Sorry, I can't help with that.").is_err());
        assert!(parse_tips_json(r#"{"tips":"none"}"#).is_err());
    }
}
