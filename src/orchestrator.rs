// src/orchestrator.rs
//! One bot run: select → format → publish → record.
//!
//! Providers are tried in a random order until one yields a fresh candidate.
//! The ledger is written only after the publisher confirmed the post, so a
//! failed publish leaves the candidate eligible for the next run.

use anyhow::{Context, Result};
use metrics::counter;
use rand::seq::SliceRandom;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};

use crate::caption::{alt_text, CaptionBuilder};
use crate::imaging::ImagePreparer;
use crate::ledger::SeenLedger;
use crate::publish::{FormattedPost, Publisher};
use crate::sources::fetch::HttpFetch;
use crate::sources::{ensure_metrics_described, find_candidate, Candidate, SourceProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Published {
        provider: &'static str,
        source_key: String,
        text: String,
    },
    /// No provider had a fresh, eligible artwork. Not an error.
    Exhausted,
}

pub struct Orchestrator<R: RngCore + Send> {
    providers: Vec<Box<dyn SourceProvider>>,
    fetcher: Arc<dyn HttpFetch>,
    publisher: Box<dyn Publisher>,
    caption: CaptionBuilder,
    images: ImagePreparer,
    alt_text_len: usize,
    rng: R,
}

impl<R: RngCore + Send> Orchestrator<R> {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        fetcher: Arc<dyn HttpFetch>,
        publisher: Box<dyn Publisher>,
        rng: R,
    ) -> Self {
        Self {
            providers,
            fetcher,
            publisher,
            caption: CaptionBuilder::default(),
            images: ImagePreparer::default(),
            alt_text_len: crate::caption::DEFAULT_ALT_TEXT_LEN,
            rng,
        }
    }

    pub fn with_caption(mut self, caption: CaptionBuilder) -> Self {
        self.caption = caption;
        self
    }

    pub fn with_images(mut self, images: ImagePreparer) -> Self {
        self.images = images;
        self
    }

    pub fn with_alt_text_len(mut self, n: usize) -> Self {
        self.alt_text_len = n;
        self
    }

    pub async fn run(&mut self, ledger: &mut SeenLedger) -> Result<RunOutcome> {
        ensure_metrics_described();

        let Some((provider, candidate)) = self.select(ledger).await else {
            info!("no usable artwork found from any source");
            counter!("runs_exhausted_total").increment(1);
            return Ok(RunOutcome::Exhausted);
        };

        let post = self.format(&candidate).await?;

        info!(provider, source_key = %candidate.source_key, publisher = self.publisher.name(), "publishing");
        self.publisher
            .publish(&post)
            .await
            .with_context(|| format!("publishing {}", candidate.source_key))?;
        counter!("posts_published_total", "provider" => provider).increment(1);

        ledger.insert(candidate.source_key.clone());
        if let Err(e) = ledger.save() {
            warn!(path = %ledger.path().display(), error = ?e, "could not persist seen ledger");
        }

        info!(provider, source_key = %candidate.source_key, "published");
        Ok(RunOutcome::Published {
            provider,
            source_key: candidate.source_key,
            text: post.text,
        })
    }

    /// Try providers in random order; first fresh candidate wins.
    async fn select(&mut self, ledger: &SeenLedger) -> Option<(&'static str, Candidate)> {
        let mut order: Vec<usize> = (0..self.providers.len()).collect();
        order.shuffle(&mut self.rng);

        for idx in order {
            let provider = self.providers[idx].as_ref();
            info!(provider = provider.name(), "trying source");
            if let Some(c) = find_candidate(provider, ledger, &mut self.rng).await {
                return Some((provider.name(), c));
            }
            info!(provider = provider.name(), "nothing usable; next source");
        }
        None
    }

    /// Build the text and fetch + shrink the image. Image failures are fatal
    /// for the run, like publish failures.
    async fn format(&self, candidate: &Candidate) -> Result<FormattedPost> {
        let text = self.caption.build(&candidate.caption);

        let raw = self
            .fetcher
            .get_bytes(&candidate.image_url)
            .await
            .with_context(|| format!("downloading image {}", candidate.image_url))?;
        let prepared = self
            .images
            .prepare(raw)
            .with_context(|| format!("preparing image {}", candidate.image_url))?;
        info!(
            size = prepared.bytes.len(),
            iterations = prepared.iterations,
            within_limit = prepared.within_limit,
            "image ready"
        );

        Ok(FormattedPost {
            alt_text: alt_text(&text, self.alt_text_len),
            text,
            image_bytes: Some(prepared.bytes),
        })
    }
}
