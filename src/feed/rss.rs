// src/feed/rss.rs
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::error::FetchError;
use crate::feed::normalize_text;
use crate::types::CandidateItem;

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

// <category domain="...">Text</category>; attributes are ignored.
#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "$text", default)]
    name: String,
}

/// RFC 2822 first (what RSS specifies), RFC 3339 as a fallback since some
/// feeds emit Atom-style stamps in `pubDate`.
pub fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn mentions(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Parse an RSS document into author-filtered candidates, in document order.
///
/// Only a document that is not well-formed XML or has no `<channel>` is an
/// error. Each `<item>` is decoded on its own: entries that fail to decode or
/// lack a usable title or link are skipped, and a missing or unparseable
/// `pubDate` becomes `fallback_ts`.
pub fn parse_feed(
    xml: &str,
    author: &str,
    fallback_ts: DateTime<Utc>,
) -> Result<Vec<CandidateItem>, FetchError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let entries = split_items(&xml_clean)?;

    let needle = author.trim().to_lowercase();
    let total = entries.len();
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for (idx, raw) in entries.iter().enumerate() {
        let it: Item = match from_str(raw) {
            Ok(it) => it,
            Err(e) => {
                skipped += 1;
                tracing::debug!(target: "feed", idx, error = %e, "skipping malformed entry");
                continue;
            }
        };
        let title = it.title.as_deref().map(normalize_text).unwrap_or_default();
        let link = it.link.as_deref().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() || link.is_empty() {
            skipped += 1;
            tracing::debug!(target: "feed", idx, "skipping entry without title or link");
            continue;
        }

        let by_author = !needle.is_empty()
            && (it.categories.iter().any(|c| mentions(&c.name, &needle))
                || mentions(&title, &needle));
        if !by_author {
            continue;
        }

        let published_at = match it.pub_date.as_deref().and_then(parse_pub_date) {
            Some(ts) => ts,
            None => {
                tracing::debug!(target: "feed", %link, raw = ?it.pub_date, "unparseable pubDate, using run time");
                fallback_ts
            }
        };

        out.push(CandidateItem {
            title,
            link,
            published_at,
            author: author.trim().to_string(),
        });
    }

    tracing::info!(
        target: "feed",
        entries = total,
        skipped,
        candidates = out.len(),
        "feed parsed"
    );
    Ok(out)
}

/// One pass over the document: checks it is well-formed, that it has a
/// `<channel>`, and cuts out every `<item>` element as its own snippet.
fn split_items(xml: &str) -> Result<Vec<String>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut has_channel = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"channel" => has_channel = true,
                b"item" => {
                    let span = reader
                        .read_to_end(e.name())
                        .map_err(|err| FetchError::Parse(err.to_string()))?;
                    let inner = xml
                        .get(span.start as usize..span.end as usize)
                        .ok_or_else(|| FetchError::Parse("item span out of range".into()))?;
                    items.push(format!("<item>{inner}</item>"));
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"channel" => has_channel = true,
                b"item" => items.push("<item/>".to_string()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(FetchError::Parse(e.to_string())),
        }
    }

    if !has_channel {
        return Err(FetchError::Parse("no <channel> element in feed".into()));
    }
    Ok(items)
}

// HTML entities are common in feeds but undefined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&pound;", "£")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
    }

    fn wrap(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Betting</title><link>https://b.example/</link>{items}</channel></rss>"#
        )
    }

    #[test]
    fn title_mention_qualifies_without_category() {
        let xml = wrap(
            r#"<item><title>Rhys Williams: Cheltenham best bets</title>
               <link>https://b.example/a</link>
               <category>Horse Racing</category></item>"#,
        );
        let out = parse_feed(&xml, "Rhys Williams", now()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].author, "Rhys Williams");
    }

    #[test]
    fn category_match_is_case_insensitive() {
        let xml = wrap(
            r#"<item><title>Tuesday racing tips</title>
               <link>https://b.example/b</link>
               <category domain="author">RHYS WILLIAMS</category></item>"#,
        );
        assert_eq!(parse_feed(&xml, "Rhys Williams", now()).unwrap().len(), 1);
    }

    #[test]
    fn other_authors_and_incomplete_entries_are_dropped() {
        let xml = wrap(
            r#"<item><title>Kevin Blake: Irish angles</title><link>https://b.example/k</link></item>
               <item><title>Rhys Williams: no link here</title></item>
               <item><link>https://b.example/untitled</link><category>Rhys Williams</category></item>
               <item><title>  </title><link>https://b.example/blank</link><category>Rhys Williams</category></item>"#,
        );
        assert!(parse_feed(&xml, "Rhys Williams", now()).unwrap().is_empty());
    }

    #[test]
    fn bad_or_missing_dates_fall_back_to_run_time() {
        let xml = wrap(
            r#"<item><title>Rhys Williams A</title><link>https://b.example/1</link><pubDate>Tue, 04 Mar 2025 09:30:00 GMT</pubDate></item>
               <item><title>Rhys Williams B</title><link>https://b.example/2</link><pubDate>yesterday-ish</pubDate></item>
               <item><title>Rhys Williams C</title><link>https://b.example/3</link></item>"#,
        );
        let out = parse_feed(&xml, "Rhys Williams", now()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].published_at, Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap());
        assert_eq!(out[1].published_at, now());
        assert_eq!(out[2].published_at, now());
    }

    #[test]
    fn html_entities_do_not_break_parsing() {
        let xml = wrap(
            r#"<item><title>Rhys Williams&nbsp;&ndash; Festival &amp; more</title><link>https://b.example/e</link></item>"#,
        );
        let out = parse_feed(&xml, "Rhys Williams", now()).unwrap();
        assert_eq!(out[0].title, "Rhys Williams - Festival & more");
    }

    #[test]
    fn malformed_entry_is_skipped_and_siblings_survive() {
        let good = r#"<item><title>Rhys Williams: Thursday tips</title><link>https://b.example/good</link></item>"#;
        let bad_entries = [
            r#"<item><title>Rhys Williams <b>bold</b> pick</title><link>https://b.example/x</link></item>"#,
            r#"<item><title>Rhys Williams one</title><title>two</title><link>https://b.example/y</link></item>"#,
            r#"<item><category>Rhys Williams</category><link>https://b.example/z</link><category>Racing</category><title>Split</title></item>"#,
        ];
        for bad in bad_entries {
            let xml = wrap(&format!("{bad}{good}"));
            let out = parse_feed(&xml, "Rhys Williams", now())
                .unwrap_or_else(|e| panic!("feed with {bad} failed: {e}"));
            let links: Vec<&str> = out.iter().map(|c| c.link.as_str()).collect();
            assert_eq!(links, vec!["https://b.example/good"], "bad entry: {bad}");
        }
    }

    #[test]
    fn xml_without_channel_is_a_parse_error() {
        assert!(matches!(
            parse_feed("<feed><entry/></feed>", "Rhys Williams", now()),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_feed("<html><body>oops", "Rhys Williams", now()),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn rfc3339_dates_are_accepted() {
        let ts = parse_pub_date("2025-03-04T09:30:00+01:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap());
        assert!(parse_pub_date("").is_none());
    }
}
