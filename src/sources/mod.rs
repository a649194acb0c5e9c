// src/sources/mod.rs
//! Museum sources: the provider contract, the shared search → shuffle →
//! skip-seen → resolve driver, and one provider per archive.

pub mod cma;
pub mod cooper;
pub mod fetch;
pub mod met;
pub mod relevance;

use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::caption::clean_field;
use crate::config::{BotConfig, SourceSettings};
use crate::ledger::SeenLedger;
use fetch::HttpFetch;

pub const UNTITLED: &str = "Untitled";

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "source_search_errors_total",
            "Failed keyword searches, per provider."
        );
        describe_counter!(
            "source_detail_errors_total",
            "Failed detail fetches or unparsable records, per provider."
        );
        describe_counter!(
            "source_items_skipped_total",
            "Search hits rejected, per provider and reason."
        );
        describe_counter!(
            "source_candidates_total",
            "Fresh candidates returned, per provider."
        );
        describe_counter!("posts_published_total", "Successful publishes.");
        describe_counter!(
            "runs_exhausted_total",
            "Runs that found nothing to publish."
        );
        describe_histogram!(
            "image_downsample_iterations",
            "Downsample passes needed to fit the image size limit."
        );
    });
}

/// A fresh, eligible artwork proposed by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// `"<source-tag>:<source-local-id>"`, the sole dedup identity.
    pub source_key: String,
    /// Title first, `Source: …` attribution last; every line non-empty.
    pub caption: Vec<String>,
    pub image_url: String,
}

pub fn source_key(tag: &str, local_id: &str) -> String {
    format!("{tag}:{local_id}")
}

/// Collects caption lines while enforcing the title/attribution shape.
#[derive(Debug, Clone)]
pub struct CaptionLines {
    lines: Vec<String>,
}

impl CaptionLines {
    /// Blank or missing titles become [`UNTITLED`].
    pub fn titled(title: Option<&str>) -> Self {
        let title = title.map(clean_field).unwrap_or_default();
        let title = if title.is_empty() {
            UNTITLED.to_string()
        } else {
            title
        };
        Self { lines: vec![title] }
    }

    /// Adds the cleaned line unless it is blank.
    pub fn push(&mut self, line: Option<&str>) -> &mut Self {
        if let Some(l) = line.map(clean_field).filter(|l| !l.is_empty()) {
            self.lines.push(l);
        }
        self
    }

    /// Resolve into a candidate; `None` when the image reference is blank.
    pub fn finish(
        mut self,
        source_key: String,
        attribution: &str,
        image_url: Option<&str>,
    ) -> Option<Candidate> {
        let image_url = image_url.map(str::trim).filter(|u| !u.is_empty())?;
        self.lines.push(format!("Source: {attribution}"));
        Some(Candidate {
            source_key,
            caption: self.lines,
            image_url: image_url.to_string(),
        })
    }
}

/// One search result. `record` is present when the search endpoint already
/// returns full records; otherwise the provider fetches detail in `resolve`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub local_id: String,
    pub record: Option<Value>,
}

impl SearchHit {
    pub fn id_only(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            record: None,
        }
    }
}

/// Why `resolve` rejected a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NotPublicDomain,
    NotRelevant,
    NoImage,
}

impl Skip {
    pub fn as_str(self) -> &'static str {
        match self {
            Skip::NotPublicDomain => "rights",
            Skip::NotRelevant => "relevance",
            Skip::NoImage => "no_image",
        }
    }
}

/// Outcome of resolving a single hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Eligible(Candidate),
    Skipped(Skip),
}

/// One archive's search/detail API.
///
/// `search` and `resolve` may fail on transport or parse errors; the driver
/// in [`find_candidate`] contains those failures per term and per item.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Human-readable label, e.g. "The Met".
    fn name(&self) -> &'static str;

    /// Namespace of this source's keys, e.g. "met".
    fn tag(&self) -> &'static str;

    /// Synonym queries; results are merged.
    fn search_terms(&self) -> &[String];

    /// `Some(reason)` when the provider lacks configuration it needs.
    fn disabled_reason(&self) -> Option<&str> {
        None
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>>;

    async fn resolve(&self, hit: SearchHit) -> Result<Resolved>;
}

/// Merge hits from several terms, keeping the first occurrence of each local id.
pub fn dedup_hits(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| seen.insert(h.local_id.clone()))
        .collect()
}

/// Run one provider: search every term, dedup by local id, shuffle, and
/// return the first hit that is not in `seen` and passes `resolve`.
/// Never fails; every problem is logged and treated as "nothing here".
pub async fn find_candidate(
    provider: &dyn SourceProvider,
    seen: &SeenLedger,
    rng: &mut (dyn RngCore + Send),
) -> Option<Candidate> {
    ensure_metrics_described();
    let name = provider.name();

    if let Some(reason) = provider.disabled_reason() {
        info!(provider = name, reason, "provider disabled");
        return None;
    }

    let mut hits = Vec::new();
    for term in provider.search_terms() {
        match provider.search(term).await {
            Ok(mut v) => {
                debug!(provider = name, term = %term, count = v.len(), "search results");
                hits.append(&mut v);
            }
            Err(e) => {
                warn!(provider = name, term = %term, error = ?e, "search failed");
                counter!("source_search_errors_total", "provider" => name).increment(1);
            }
        }
    }

    let mut hits = dedup_hits(hits);
    info!(provider = name, count = hits.len(), "merged search hits");
    hits.shuffle(rng);

    for hit in hits {
        let key = source_key(provider.tag(), &hit.local_id);
        if seen.contains(&key) {
            debug!(provider = name, source_key = %key, "already posted");
            continue;
        }
        match provider.resolve(hit).await {
            Ok(Resolved::Eligible(c)) => {
                info!(provider = name, source_key = %c.source_key, "selected candidate");
                counter!("source_candidates_total", "provider" => name).increment(1);
                return Some(c);
            }
            Ok(Resolved::Skipped(why)) => {
                debug!(provider = name, source_key = %key, reason = why.as_str(), "skipped");
                counter!(
                    "source_items_skipped_total",
                    "provider" => name,
                    "reason" => why.as_str()
                )
                .increment(1);
            }
            Err(e) => {
                warn!(provider = name, source_key = %key, error = ?e, "detail failed; skipping");
                counter!("source_detail_errors_total", "provider" => name).increment(1);
            }
        }
    }

    info!(provider = name, "no usable artwork");
    None
}

/// The three museum providers, configured from `config`.
pub fn default_providers(
    config: &BotConfig,
    fetcher: Arc<dyn HttpFetch>,
) -> Vec<Box<dyn SourceProvider>> {
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    let s = &config.sources;

    if enabled(met::TAG, &s.met) {
        out.push(Box::new(met::MetProvider::new(fetcher.clone(), s.met.clone())));
    }
    if enabled(cma::TAG, &s.cma) {
        out.push(Box::new(cma::CmaProvider::new(fetcher.clone(), s.cma.clone())));
    }
    if enabled(cooper::TAG, &s.cooper) {
        out.push(Box::new(cooper::CooperHewittProvider::new(
            fetcher,
            s.cooper.clone(),
            config.cooper_api_key.clone(),
        )));
    }
    out
}

fn enabled(tag: &str, settings: &SourceSettings) -> bool {
    if !settings.enabled {
        info!(provider = tag, "provider turned off in sources config");
    }
    settings.enabled
}

/// Turn full search records into hits keyed by their `id`. Records without a
/// usable id cannot be deduplicated, so they are dropped and counted.
pub(crate) fn hits_from_records(provider: &'static str, records: Vec<Value>) -> Vec<SearchHit> {
    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        match text_at(&rec, &["id"]) {
            Some(id) => out.push(SearchHit {
                local_id: id,
                record: Some(rec),
            }),
            None => {
                debug!(provider, "search record without id; skipped");
                counter!(
                    "source_items_skipped_total",
                    "provider" => provider,
                    "reason" => "no_id"
                )
                .increment(1);
            }
        }
    }
    out
}

/// Read `value[path…]` as trimmed text; numbers are rendered, null/empty is `None`.
pub(crate) fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut cur = value;
    for p in path {
        cur = cur.get(p)?;
    }
    match cur {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
