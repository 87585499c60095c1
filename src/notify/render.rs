// src/notify/render.rs
//! Message bodies. Pure functions of (items, author, send time).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use chrono_tz::Europe::Dublin;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::types::{EnrichedItem, Tip};

/// Irish local time (GMT/IST), day first.
fn when(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Dublin)
        .format("%d/%m/%Y, %H:%M:%S")
        .to_string()
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn tip_line(t: &Tip) -> String {
    let mut s = t.subject_name.clone();
    let place: Vec<&str> = [t.location.as_str(), t.time.as_str()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if !place.is_empty() {
        let _ = write!(s, " ({})", place.join(" "));
    }
    if !t.suggested_price.is_empty() {
        let _ = write!(s, " @ {}", t.suggested_price);
    }
    if !t.stake_units.is_empty() {
        let _ = write!(s, ", {}pt", t.stake_units);
    }
    let _ = write!(s, " {}", t.bet_kind.label());
    s
}

pub fn email_subject(author: &str, n: usize) -> String {
    format!("🏇 New {author} Tips - {n} post{}", plural(n))
}

pub fn email_text(items: &[EnrichedItem], author: &str, sent_at: DateTime<Utc>) -> String {
    let mut body = format!(
        "New horse racing tips from {author} ({} post{}):\n\n",
        items.len(),
        plural(items.len())
    );
    for (i, it) in items.iter().enumerate() {
        let _ = writeln!(body, "{}. {}", i + 1, it.item.title);
        let _ = writeln!(body, "   📅 {}", when(&it.item.published_at));
        let _ = writeln!(body, "   🔗 {}", it.item.link);
        for t in &it.tips {
            let _ = writeln!(body, "   🎯 {}", tip_line(t));
        }
        body.push('\n');
    }
    body.push_str("Happy betting! 🐎\n");
    let _ = write!(body, "Alert sent at: {}", when(&sent_at));
    body
}

pub fn email_html(items: &[EnrichedItem], author: &str, sent_at: DateTime<Utc>) -> String {
    let mut html = format!(
        "<h2>🏇 New {} Tips</h2>\n<p>Found <strong>{}</strong> new post{}:</p>\n<ol>\n",
        encode_text(author),
        items.len(),
        plural(items.len())
    );
    for it in items {
        let _ = write!(
            html,
            "<li style=\"margin-bottom: 15px;\"><strong><a href=\"{}\" target=\"_blank\">{}</a></strong><br>\
             <small>📅 {}</small>",
            encode_double_quoted_attribute(&it.item.link),
            encode_text(&it.item.title),
            when(&it.item.published_at)
        );
        if !it.tips.is_empty() {
            html.push_str("\n<ul>");
            for t in &it.tips {
                let _ = write!(html, "<li>{}</li>", encode_text(&tip_line(t)));
            }
            html.push_str("</ul>");
        }
        html.push_str("</li>\n");
    }
    let _ = write!(
        html,
        "</ol>\n<p>Happy betting! 🐎</p>\n<p><small>Alert sent at: {}</small></p>\n",
        when(&sent_at)
    );
    html
}

/// Slack mrkdwn. `<`, `>` and `&` in titles are escaped as Slack requires.
pub fn chat_text(items: &[EnrichedItem], author: &str, sent_at: DateTime<Utc>) -> String {
    let mut msg = format!(
        "🏇 *New {author} Tips* ({} post{}):\n\n",
        items.len(),
        plural(items.len())
    );
    for (i, it) in items.iter().enumerate() {
        let _ = writeln!(msg, "{}. *{}*", i + 1, slack_escape(&it.item.title));
        let _ = writeln!(msg, "   📅 {}", when(&it.item.published_at));
        let _ = writeln!(msg, "   🔗 <{}|Read More>", it.item.link);
        for t in &it.tips {
            let _ = writeln!(msg, "   🎯 {}", slack_escape(&tip_line(t)));
        }
        msg.push('\n');
    }
    let _ = write!(msg, "🤖 _Alert sent at {}_", when(&sent_at));
    msg
}

fn slack_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
