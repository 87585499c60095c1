// src/feed/mod.rs
pub mod http;
pub mod rss;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::MonitorConfig;
use crate::error::FetchError;
use crate::types::CandidateItem;
use self::http::HttpFetch;

pub use rss::{parse_feed, parse_pub_date};

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

/// Normalize text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("static regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Fetch the configured feed and return author-filtered candidates.
///
/// Network failures, non-2xx responses and unparseable documents are all
/// fatal for the run; a single bad entry is not.
pub async fn fetch_candidates(
    http: &dyn HttpFetch,
    cfg: &MonitorConfig,
    run_ts: DateTime<Utc>,
) -> Result<Vec<CandidateItem>, FetchError> {
    let url = cfg.feed_url.as_str();
    tracing::info!(target: "feed", %url, "fetching feed");
    let t0 = std::time::Instant::now();

    let page = http
        .fetch(
            url,
            &[("User-Agent", cfg.user_agent.as_str()), ("Accept", FEED_ACCEPT)],
        )
        .await
        .map_err(|source| {
            counter!("feed_fetch_errors_total").increment(1);
            FetchError::Network {
                url: url.to_string(),
                source,
            }
        })?;

    tracing::info!(target: "feed", status = page.status, bytes = page.body.len(), "feed response");
    if !page.is_success() {
        counter!("feed_fetch_errors_total").increment(1);
        return Err(FetchError::Status {
            url: url.to_string(),
            status: page.status,
        });
    }

    let out = parse_feed(&page.body, &cfg.author_name, run_ts)?;
    histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("feed_candidates_total").increment(out.len() as u64);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::http::StaticFetcher;
    use chrono::TimeZone;

    #[test]
    fn normalize_text_collapses_ws_and_strips_tags() {
        let s = "  <b>Rhys&nbsp;&nbsp;Williams</b>:\n “Day one” tips  ";
        assert_eq!(normalize_text(s), "Rhys Williams: \"Day one\" tips");
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let cfg = MonitorConfig::default();
        let http = StaticFetcher::new().with_page(&cfg.feed_url, 503, "busy");
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        match fetch_candidates(&http, &cfg, now).await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_identifying_headers() {
        let cfg = MonitorConfig::default();
        let http = StaticFetcher::new().with_page(
            &cfg.feed_url,
            200,
            "<rss><channel></channel></rss>",
        );
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let out = fetch_candidates(&http, &cfg, now).await.unwrap();
        assert!(out.is_empty());

        let calls = http.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .1
            .iter()
            .any(|(k, v)| k == "User-Agent" && v == &cfg.user_agent));
    }

    #[tokio::test]
    async fn unreachable_feed_is_a_network_error() {
        let cfg = MonitorConfig::default();
        let http = StaticFetcher::new();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            fetch_candidates(&http, &cfg, now).await,
            Err(FetchError::Network { .. })
        ));
    }
}
