// Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use axum::{http::StatusCode, routing::post, Json, Router};
use rhys_monitor::feed::http::StaticFetcher;
use rhys_monitor::notify::Notifier;
use rhys_monitor::{Channel, EnrichedItem, MonitorConfig};
use serde_json::Value;

pub const FEED_URL: &str = "https://feed.test/index.xml";
pub const FEED_XML: &str = include_str!("../fixtures/betfair_rss.xml");

pub const L1: &str = "https://betting.betfair.com/horse-racing/cheltenham/day-one-tips-L1.html";
pub const L2: &str = "https://betting.betfair.com/horse-racing/tips/sunday-naas-L2.html";
pub const OTHER: &str = "https://betting.betfair.com/horse-racing/kevin-blake-irish-angles.html";

/// Config pointing at the canned feed, with every channel and enrichment off.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        feed_url: FEED_URL.to_string(),
        ..MonitorConfig::default()
    }
}

pub fn feed_fetcher() -> StaticFetcher {
    StaticFetcher::new().with_page(FEED_URL, 200, FEED_XML)
}

/// Notifier that records what it was asked to send.
pub struct Recording {
    pub channel: Channel,
    pub fail_with: Option<String>,
    pub batches: Mutex<Vec<Vec<EnrichedItem>>>,
}

impl Recording {
    pub fn ok(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            fail_with: None,
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(channel: Channel, msg: &str) -> Arc<Self> {
        Arc::new(Self {
            channel,
            fail_with: Some(msg.to_string()),
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_links(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.iter().map(|i| i.item.link.clone()).collect())
            .collect()
    }
}

#[async_trait::async_trait]
impl Notifier for Recording {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, items: &[EnrichedItem]) -> Result<()> {
        self.batches.lock().unwrap().push(items.to_vec());
        match &self.fail_with {
            Some(m) => Err(anyhow!("{m}")),
            None => Ok(()),
        }
    }
}

/// Local webhook endpoint answering every POST with `status`.
/// Returns the URL and the JSON bodies it received.
pub async fn spawn_webhook(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                let reply = if status.is_success() { "ok" } else { "internal_error" };
                (status, reply)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}
