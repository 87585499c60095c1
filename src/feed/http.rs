// src/feed/http.rs
//! Outbound GET capability shared by the feed fetcher and the enricher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `Err` means the request never produced a response (DNS, TLS, timeout...).
/// Non-2xx responses are returned as pages; callers decide what they mean.
#[async_trait::async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchedPage>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchedPage> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.context("reading response body")?;
        Ok(FetchedPage { status, body })
    }
}

/// Canned responses keyed by URL. Unknown URLs fail like a network error.
/// Records every request so tests can assert on headers and call order.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, Result<FetchedPage, String>>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.set_page(url, status, body);
        self
    }

    pub fn with_error(self, url: &str, msg: &str) -> Self {
        lock(&self.pages).insert(url.to_string(), Err(msg.to_string()));
        self
    }

    /// Replace a response between runs.
    pub fn set_page(&self, url: &str, status: u16, body: impl Into<String>) {
        lock(&self.pages).insert(
            url.to_string(),
            Ok(FetchedPage {
                status,
                body: body.into(),
            }),
        );
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|(u, _)| u == url).count()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}

#[async_trait::async_trait]
impl HttpFetch for StaticFetcher {
    async fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchedPage> {
        lock(&self.calls).push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        match lock(&self.pages).get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Err(anyhow!("connection refused: {url}")),
        }
    }
}
