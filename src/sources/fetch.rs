// src/sources/fetch.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("tomato-bot/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Network access used by providers and for image downloads.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value>;
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher with a finite timeout on every call.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(timeout_secs.clamp(1, 10)))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for HttpFetcher {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} status"))?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("GET {url} json body"))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} status"))?;
        let bytes = resp.bytes().await.context("reading body bytes")?;
        Ok(bytes.to_vec())
    }
}

// --- Test helper ---

struct JsonRoute {
    url: String,
    /// When set, only requests carrying a query pair with this value match.
    term: Option<String>,
    body: Value,
}

/// Serves canned JSON and bytes by URL. Unknown routes fail like a dead
/// connection would, which is how tests exercise the skip paths.
#[derive(Default)]
pub struct FixtureFetcher {
    json: Vec<JsonRoute>,
    bytes: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, url: &str, body: Value) -> Self {
        self.json.push(JsonRoute {
            url: url.to_string(),
            term: None,
            body,
        });
        self
    }

    /// Route matching `url` only when a query parameter equals `term`.
    pub fn with_search(mut self, url: &str, term: &str, body: Value) -> Self {
        self.json.push(JsonRoute {
            url: url.to_string(),
            term: Some(term.to_string()),
            body,
        });
        self
    }

    /// Parse `raw` as JSON; panics on bad fixtures since those are test bugs.
    pub fn with_json_str(self, url: &str, raw: &str) -> Self {
        let body = serde_json::from_str(raw).expect("fixture json");
        self.with_json(url, body)
    }

    pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.bytes.insert(url.to_string(), bytes);
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, url: &str) {
        if let Ok(mut c) = self.calls.lock() {
            c.push(url.to_string());
        }
    }
}

#[async_trait]
impl HttpFetch for FixtureFetcher {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.record(url);
        self.json
            .iter()
            .find(|r| {
                r.url == url
                    && r.term
                        .as_deref()
                        .map_or(true, |t| query.iter().any(|(_, v)| v == t))
            })
            .map(|r| r.body.clone())
            .ok_or_else(|| anyhow!("no fixture for {url}"))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.record(url);
        self.bytes
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture bytes for {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fixture_routes_by_url_and_term() {
        let f = FixtureFetcher::new()
            .with_search("https://x.test/search", "tomato", json!({"hits": 1}))
            .with_json("https://x.test/object/1", json!({"id": 1}));

        let q = [("q", "tomato".to_string())];
        assert_eq!(
            f.get_json("https://x.test/search", &q).await.unwrap(),
            json!({"hits": 1})
        );
        let other = [("q", "potato".to_string())];
        assert!(f.get_json("https://x.test/search", &other).await.is_err());
        assert!(f.get_json("https://x.test/object/1", &[]).await.is_ok());
        assert!(f.get_bytes("https://x.test/img.jpg").await.is_err());
        assert_eq!(f.calls().len(), 4);
    }
}
