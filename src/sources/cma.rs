// src/sources/cma.rs
//! Cleveland Museum of Art Open Access API. Search returns full records.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::fetch::HttpFetch;
use super::relevance::RelevanceRule;
use super::{hits_from_records, source_key, CaptionLines, Resolved, SearchHit, Skip, SourceProvider};
use crate::config::SourceSettings;

pub const TAG: &str = "cma";
pub const SEARCH_URL: &str = "https://openaccess-api.clevelandart.org/api/artworks/";
const ATTRIBUTION: &str = "The Cleveland Museum of Art (CC0)";

pub fn default_settings() -> SourceSettings {
    SourceSettings::new(
        ["tomato", "tomatoes"],
        RelevanceRule::substring(["tomato"], ["title", "description", "technique", "type"]),
    )
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CmaArtwork {
    title: Option<String>,
    description: Option<String>,
    technique: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    creation_date: Option<String>,
    creditline: Option<String>,
    share_license_status: Option<String>,
    creators: Option<Vec<CmaCreator>>,
    images: Option<CmaImages>,
}

#[derive(Debug, Deserialize)]
struct CmaCreator {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CmaImages {
    web: Option<CmaImage>,
}

#[derive(Debug, Deserialize)]
struct CmaImage {
    url: Option<String>,
}

pub struct CmaProvider {
    fetcher: Arc<dyn HttpFetch>,
    settings: SourceSettings,
}

impl CmaProvider {
    pub fn new(fetcher: Arc<dyn HttpFetch>, settings: SourceSettings) -> Self {
        Self { fetcher, settings }
    }

    fn evaluate(&self, local_id: &str, art: CmaArtwork) -> Resolved {
        // The search already filters on cc0=1; a record that says otherwise loses.
        if let Some(status) = art.share_license_status.as_deref() {
            if !status.trim().eq_ignore_ascii_case("cc0") {
                return Resolved::Skipped(Skip::NotPublicDomain);
            }
        }

        let fields = [
            ("title", art.title.clone().unwrap_or_default()),
            ("description", art.description.clone().unwrap_or_default()),
            ("technique", art.technique.clone().unwrap_or_default()),
            ("type", art.kind.clone().unwrap_or_default()),
        ];
        if !self.settings.relevance.matches(&fields) {
            return Resolved::Skipped(Skip::NotRelevant);
        }

        let image = art
            .images
            .as_ref()
            .and_then(|i| i.web.as_ref())
            .and_then(|w| w.url.as_deref());
        let creator = art
            .creators
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.description.as_deref());

        let mut lines = CaptionLines::titled(art.title.as_deref());
        lines
            .push(creator)
            .push(art.creation_date.as_deref())
            .push(art.creditline.as_deref());
        match lines.finish(source_key(TAG, local_id), ATTRIBUTION, image) {
            Some(c) => Resolved::Eligible(c),
            None => Resolved::Skipped(Skip::NoImage),
        }
    }
}

#[async_trait]
impl SourceProvider for CmaProvider {
    fn name(&self) -> &'static str {
        "Cleveland Museum of Art"
    }

    fn tag(&self) -> &'static str {
        TAG
    }

    fn search_terms(&self) -> &[String] {
        &self.settings.terms
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let query = [
            ("q", term.to_string()),
            ("has_image", "1".to_string()),
            ("cc0", "1".to_string()),
            ("limit", "100".to_string()),
        ];
        let body = self.fetcher.get_json(SEARCH_URL, &query).await?;
        let resp: SearchResponse = serde_json::from_value(body).context("parsing cma search")?;
        Ok(hits_from_records(self.name(), resp.data))
    }

    async fn resolve(&self, hit: SearchHit) -> Result<Resolved> {
        let record = hit
            .record
            .ok_or_else(|| anyhow!("cma hit {} carries no record", hit.local_id))?;
        let art: CmaArtwork = serde_json::from_value(record)
            .with_context(|| format!("parsing cma artwork {}", hit.local_id))?;
        Ok(self.evaluate(&hit.local_id, art))
    }
}
