// src/sources/cooper.rs
//! Cooper Hewitt, Smithsonian Design Museum collection API.
//!
//! Needs an access token (`COOPER_API_KEY`); without one the provider is
//! disabled and yields nothing.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::fetch::HttpFetch;
use super::relevance::RelevanceRule;
use super::{hits_from_records, source_key, text_at, CaptionLines, Resolved, SearchHit, Skip, SourceProvider};
use crate::config::SourceSettings;

pub const TAG: &str = "cooper";
pub const API_URL: &str = "https://api.collection.cooperhewitt.org/rest/";
const SEARCH_METHOD: &str = "cooperhewitt.search.objects";
const ATTRIBUTION: &str = "Cooper Hewitt, Smithsonian Design Museum";

/// Image renditions in order of preference: 1024px, 640px, 320px.
const IMAGE_SIZES: [&str; 3] = ["b", "z", "n"];

pub fn default_settings() -> SourceSettings {
    // Search metadata is thin here, so the search engine is trusted.
    SourceSettings::new(["tomato", "tomatoes"], RelevanceRule::TrustSearch)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    stat: Option<String>,
    #[serde(default)]
    objects: Option<Vec<Value>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

pub struct CooperHewittProvider {
    fetcher: Arc<dyn HttpFetch>,
    settings: SourceSettings,
    api_key: Option<String>,
}

impl CooperHewittProvider {
    pub fn new(fetcher: Arc<dyn HttpFetch>, settings: SourceSettings, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            settings,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn evaluate(&self, local_id: &str, rec: &Value) -> Resolved {
        let title = text_at(rec, &["title"]);
        let description = text_at(rec, &["description"]);
        let date = text_at(rec, &["date"]);

        let fields = [
            ("title", title.clone().unwrap_or_default()),
            ("description", description.clone().unwrap_or_default()),
            ("medium", text_at(rec, &["medium"]).unwrap_or_default()),
            ("type", text_at(rec, &["type"]).unwrap_or_default()),
        ];
        if !self.settings.relevance.matches(&fields) {
            return Resolved::Skipped(Skip::NotRelevant);
        }

        let image = rec
            .get("images")
            .and_then(Value::as_array)
            .and_then(|imgs| imgs.first())
            .and_then(|first| {
                IMAGE_SIZES
                    .iter()
                    .find_map(|size| text_at(first, &[*size, "url"]))
            });

        let mut lines = CaptionLines::titled(title.as_deref());
        lines.push(date.as_deref()).push(description.as_deref());
        match lines.finish(source_key(TAG, local_id), ATTRIBUTION, image.as_deref()) {
            Some(c) => Resolved::Eligible(c),
            None => Resolved::Skipped(Skip::NoImage),
        }
    }
}

#[async_trait]
impl SourceProvider for CooperHewittProvider {
    fn name(&self) -> &'static str {
        "Cooper Hewitt"
    }

    fn tag(&self) -> &'static str {
        TAG
    }

    fn search_terms(&self) -> &[String] {
        &self.settings.terms
    }

    fn disabled_reason(&self) -> Option<&str> {
        match self.api_key {
            Some(_) => None,
            None => Some("COOPER_API_KEY not set"),
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("cooper hewitt access token missing"))?;
        let query = [
            ("method", SEARCH_METHOD.to_string()),
            ("access_token", key.to_string()),
            ("query", term.to_string()),
            ("has_images", "1".to_string()),
            ("per_page", "100".to_string()),
        ];
        let body = self.fetcher.get_json(API_URL, &query).await?;
        let resp: SearchResponse =
            serde_json::from_value(body).context("parsing cooper hewitt search")?;

        if resp.stat.as_deref() != Some("ok") {
            let msg = resp
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("cooper hewitt search failed: {msg}");
        }

        Ok(hits_from_records(
            self.name(),
            resp.objects.unwrap_or_default(),
        ))
    }

    async fn resolve(&self, hit: SearchHit) -> Result<Resolved> {
        let record = hit
            .record
            .as_ref()
            .ok_or_else(|| anyhow!("cooper hit {} carries no record", hit.local_id))?;
        Ok(self.evaluate(&hit.local_id, record))
    }
}
