// src/sources/met.rs
//! The Metropolitan Museum of Art Open Access API.
//!
//! Search returns bare object IDs; each candidate needs a detail fetch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::fetch::HttpFetch;
use super::relevance::RelevanceRule;
use super::{source_key, CaptionLines, Resolved, SearchHit, Skip, SourceProvider};
use crate::config::SourceSettings;

pub const TAG: &str = "met";
pub const SEARCH_URL: &str = "https://collectionapi.metmuseum.org/public/collection/v1/search";
pub const OBJECT_URL: &str = "https://collectionapi.metmuseum.org/public/collection/v1/objects";

pub fn default_settings() -> SourceSettings {
    SourceSettings::new(
        ["tomato", "tomatoes", "lycopersicon"],
        RelevanceRule::substring(
            ["tomato", "lycopersicon"],
            ["title", "tags", "medium", "object_name", "classification"],
        ),
    )
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "objectIDs", default)]
    object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetObject {
    #[serde(default)]
    is_public_domain: bool,
    title: Option<String>,
    #[serde(default)]
    tags: Option<Vec<MetTag>>,
    medium: Option<String>,
    object_name: Option<String>,
    classification: Option<String>,
    primary_image: Option<String>,
    primary_image_small: Option<String>,
    artist_display_name: Option<String>,
    object_date: Option<String>,
    credit_line: Option<String>,
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetTag {
    term: Option<String>,
}

pub struct MetProvider {
    fetcher: Arc<dyn HttpFetch>,
    settings: SourceSettings,
}

impl MetProvider {
    pub fn new(fetcher: Arc<dyn HttpFetch>, settings: SourceSettings) -> Self {
        Self { fetcher, settings }
    }

    fn evaluate(&self, local_id: &str, obj: MetObject) -> Resolved {
        if !obj.is_public_domain {
            return Resolved::Skipped(Skip::NotPublicDomain);
        }

        let tags = obj
            .tags
            .iter()
            .flatten()
            .filter_map(|t| t.term.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        let fields = [
            ("title", obj.title.clone().unwrap_or_default()),
            ("tags", tags),
            ("medium", obj.medium.clone().unwrap_or_default()),
            ("object_name", obj.object_name.clone().unwrap_or_default()),
            ("classification", obj.classification.clone().unwrap_or_default()),
        ];
        if !self.settings.relevance.matches(&fields) {
            return Resolved::Skipped(Skip::NotRelevant);
        }

        // The small web rendition is plenty for a feed post.
        let image = [&obj.primary_image_small, &obj.primary_image]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty());

        let attribution = match obj.department.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => format!("{d}, The Met Open Access"),
            _ => "The Met Open Access".to_string(),
        };

        let mut lines = CaptionLines::titled(obj.title.as_deref());
        lines
            .push(obj.artist_display_name.as_deref())
            .push(obj.object_date.as_deref())
            .push(obj.credit_line.as_deref());
        match lines.finish(source_key(TAG, local_id), &attribution, image) {
            Some(c) => Resolved::Eligible(c),
            None => Resolved::Skipped(Skip::NoImage),
        }
    }
}

#[async_trait]
impl SourceProvider for MetProvider {
    fn name(&self) -> &'static str {
        "The Met"
    }

    fn tag(&self) -> &'static str {
        TAG
    }

    fn search_terms(&self) -> &[String] {
        &self.settings.terms
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let query = [("q", term.to_string()), ("hasImages", "true".to_string())];
        let body = self.fetcher.get_json(SEARCH_URL, &query).await?;
        let resp: SearchResponse = serde_json::from_value(body).context("parsing met search")?;
        Ok(resp
            .object_ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| SearchHit::id_only(id.to_string()))
            .collect())
    }

    async fn resolve(&self, hit: SearchHit) -> Result<Resolved> {
        let url = format!("{OBJECT_URL}/{}", hit.local_id);
        let body = self.fetcher.get_json(&url, &[]).await?;
        let obj: MetObject = serde_json::from_value(body)
            .with_context(|| format!("parsing met object {}", hit.local_id))?;
        Ok(self.evaluate(&hit.local_id, obj))
    }
}
