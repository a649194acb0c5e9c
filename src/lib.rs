// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod caption;
pub mod config;
pub mod imaging;
pub mod ledger;
pub mod orchestrator;
pub mod publish;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::config::BotConfig;
pub use crate::ledger::SeenLedger;
pub use crate::orchestrator::{Orchestrator, RunOutcome};
pub use crate::sources::{Candidate, SourceProvider};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

use crate::caption::CaptionBuilder;
use crate::imaging::ImagePreparer;
use crate::publish::bluesky::BlueskyPublisher;
use crate::sources::fetch::{HttpFetch, HttpFetcher};

/// Wire the production collaborators from `config` and perform one run.
pub async fn run_once(config: &BotConfig) -> anyhow::Result<RunOutcome> {
    let fetcher: Arc<dyn HttpFetch> = Arc::new(HttpFetcher::new(config.http_timeout_secs)?);
    let providers = sources::default_providers(config, fetcher.clone());
    let publisher = BlueskyPublisher::new(config.bluesky.clone(), config.http_timeout_secs)?;

    let rng = match config.rng_seed {
        Some(seed) => {
            info!(seed, "using fixed rng seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let mut ledger = SeenLedger::load(&config.ledger_path);
    let mut orchestrator = Orchestrator::new(providers, fetcher, Box::new(publisher), rng)
        .with_caption(CaptionBuilder::new(config.max_text_len, &config.hashtags))
        .with_images(ImagePreparer::new(config.image_size_limit))
        .with_alt_text_len(config.alt_text_len);

    orchestrator.run(&mut ledger).await
}
