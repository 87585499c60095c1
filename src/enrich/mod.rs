// src/enrich/mod.rs
//! Optional per-item enrichment: fetch the article page, find the tips
//! region, hand it to the extractor. Every failure ends as "no tips".

pub mod extractor;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use metrics::counter;
use scraper::{Html, Selector};

use crate::config::EnrichmentSettings;
use crate::feed::http::HttpFetch;
use crate::types::{CandidateItem, Tip};
pub use extractor::{MockExtractor, OpenAiExtractor, TipExtractor};

/// Article pages are fetched looking like a browser; the feed UA gets challenged.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

// Lowercase markers of anti-bot interstitials (Cloudflare and friends).
const CHALLENGE_MARKERS: &[&str] = &[
    "<title>just a moment...</title>",
    "cf-browser-verification",
    "cf-challenge",
    "challenge-platform",
    "attention required! | cloudflare",
    "checking your browser before accessing",
    "enable javascript and cookies to continue",
    "<title>access denied</title>",
    "px-captcha",
];

pub fn is_bot_challenge(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// What happened to one item; used for logs and counters only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichStatus {
    Extracted,
    PageUnavailable,
    BotChallenge,
    NoContentRegion,
    ExtractorFailed,
}

impl EnrichStatus {
    fn as_str(self) -> &'static str {
        match self {
            EnrichStatus::Extracted => "extracted",
            EnrichStatus::PageUnavailable => "page_unavailable",
            EnrichStatus::BotChallenge => "bot_challenge",
            EnrichStatus::NoContentRegion => "no_content",
            EnrichStatus::ExtractorFailed => "extractor_failed",
        }
    }
}

pub struct Enricher {
    http: Arc<dyn HttpFetch>,
    extractor: Arc<dyn TipExtractor>,
    content: Selector,
    delay: Duration,
    max_fragment_chars: usize,
}

impl Enricher {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        extractor: Arc<dyn TipExtractor>,
        settings: &EnrichmentSettings,
    ) -> Result<Self> {
        let content = Selector::parse(&settings.content_selector).map_err(|e| {
            anyhow!(
                "invalid content selector '{}': {e}",
                settings.content_selector
            )
        })?;
        Ok(Self {
            http,
            extractor,
            content,
            delay: settings.delay,
            max_fragment_chars: settings.max_fragment_chars,
        })
    }

    /// Tips for one item. Never fails; sleeps the pacing delay first.
    pub async fn enrich(&self, item: &CandidateItem) -> Vec<Tip> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (status, tips) = self.enrich_inner(item).await;
        counter!("enrich_items_total", "status" => status.as_str()).increment(1);
        tracing::info!(
            target: "enrich",
            link = %item.link,
            status = status.as_str(),
            tips = tips.len(),
            provider = self.extractor.name(),
            "enrichment finished"
        );
        tips
    }

    async fn enrich_inner(&self, item: &CandidateItem) -> (EnrichStatus, Vec<Tip>) {
        let page = match self
            .http
            .fetch(&item.link, &[("User-Agent", BROWSER_USER_AGENT)])
            .await
        {
            Ok(p) if p.is_success() => p,
            Ok(p) => {
                // Cloudflare answers challenges with 403/503
                if is_bot_challenge(&p.body) {
                    return (EnrichStatus::BotChallenge, Vec::new());
                }
                tracing::warn!(target: "enrich", link = %item.link, status = p.status, "article page non-2xx");
                return (EnrichStatus::PageUnavailable, Vec::new());
            }
            Err(e) => {
                tracing::warn!(target: "enrich", link = %item.link, error = %format!("{e:#}"), "article page fetch failed");
                return (EnrichStatus::PageUnavailable, Vec::new());
            }
        };

        if is_bot_challenge(&page.body) {
            return (EnrichStatus::BotChallenge, Vec::new());
        }

        let Some(fragment) =
            extract_content_fragment(&page.body, &self.content, self.max_fragment_chars)
        else {
            return (EnrichStatus::NoContentRegion, Vec::new());
        };

        match self.extractor.extract(&fragment).await {
            Ok(tips) => (EnrichStatus::Extracted, tips),
            Err(e) => {
                tracing::warn!(target: "enrich", link = %item.link, error = %format!("{e:#}"), "tip extraction failed");
                (EnrichStatus::ExtractorFailed, Vec::new())
            }
        }
    }
}

/// Inner HTML of the first element matching `selector`, capped at `max_chars`.
/// `None` when the region is missing or has no text.
pub fn extract_content_fragment(html: &str, selector: &Selector, max_chars: usize) -> Option<String> {
    let doc = Html::parse_document(html);
    let el = doc.select(selector).next()?;
    let has_text = el.text().any(|t| !t.trim().is_empty());
    if !has_text {
        return None;
    }
    let inner = el.inner_html();
    let trimmed = inner.trim();
    if trimmed.chars().count() > max_chars {
        Some(trimmed.chars().take(max_chars).collect())
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::http::StaticFetcher;
    use crate::types::BetKind;
    use chrono::{TimeZone, Utc};

    fn settings() -> EnrichmentSettings {
        EnrichmentSettings {
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            content_selector: ".entry_content".into(),
            delay: Duration::ZERO,
            max_fragment_chars: 2_000,
        }
    }

    fn item(link: &str) -> CandidateItem {
        CandidateItem {
            title: "Rhys Williams: Wednesday tips".into(),
            link: link.into(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 5, 8, 0, 0).unwrap(),
            author: "Rhys Williams".into(),
        }
    }

    fn one_tip() -> Vec<Tip> {
        vec![Tip {
            subject_name: "Energumene".into(),
            location: "Cheltenham".into(),
            time: "15:30".into(),
            suggested_price: "5/2".into(),
            stake_units: "2".into(),
            bet_kind: BetKind::Win,
        }]
    }

    fn enricher(http: StaticFetcher, fixed: Result<Vec<Tip>, String>) -> Enricher {
        Enricher::new(Arc::new(http), Arc::new(MockExtractor { fixed }), &settings()).unwrap()
    }

    #[test]
    fn challenge_markers_match_case_insensitively() {
        assert!(is_bot_challenge("<html><head><TITLE>Just a moment...</TITLE>"));
        assert!(!is_bot_challenge("<html><title>Cheltenham tips</title>"));
    }

    #[test]
    fn fragment_requires_text_and_is_capped() {
        let sel = Selector::parse(".entry_content").unwrap();
        assert!(extract_content_fragment("<div class='entry_content'>  </div>", &sel, 100).is_none());
        assert!(extract_content_fragment("<p>no region</p>", &sel, 100).is_none());
        let f = extract_content_fragment("<div class='entry_content'><p>abcdefghij</p></div>", &sel, 5).unwrap();
        assert_eq!(f, "<p>ab");
    }

    #[tokio::test]
    async fn bot_challenge_yields_no_tips() {
        let http = StaticFetcher::new().with_page(
            "https://b.example/a",
            200,
            "<html><head><title>Just a moment...</title></head><body class='entry_content'>checking</body></html>",
        );
        let e = enricher(http, Ok(one_tip()));
        assert!(e.enrich(&item("https://b.example/a")).await.is_empty());
    }

    #[tokio::test]
    async fn extractor_failure_and_missing_page_yield_no_tips() {
        let http = StaticFetcher::new().with_page(
            "https://b.example/a",
            200,
            "<div class='entry_content'><p>Back Energumene</p></div>",
        );
        let e = enricher(http, Err("rate limited".into()));
        assert!(e.enrich(&item("https://b.example/a")).await.is_empty());
        assert!(e.enrich(&item("https://b.example/missing")).await.is_empty());
    }

    #[tokio::test]
    async fn located_region_is_sent_to_extractor() {
        let http = StaticFetcher::new().with_page(
            "https://b.example/a",
            200,
            "<div class='entry_content'><p>Back Energumene 2pts win at 5/2</p></div>",
        );
        let e = enricher(http, Ok(one_tip()));
        let tips = e.enrich(&item("https://b.example/a")).await;
        assert_eq!(tips, one_tip());
    }
}
