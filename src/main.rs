//! tomato-bot — binary entrypoint.
//! Loads `.env`, sets up logging, performs one select → publish run and exits.

use tomato_bot::config::json_logs_requested;
use tomato_bot::{BotConfig, RunOutcome};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact human-readable logs by default; JSON lines when `TOMATO_LOG_JSON=1`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tomato_bot=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs_requested(|k| std::env::var(k).ok()) {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Local runs keep credentials in .env; scheduled runs get real env vars.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = BotConfig::from_env();
    tracing::debug!(?config, "configuration");

    match tomato_bot::run_once(&config).await {
        Ok(RunOutcome::Published {
            provider,
            source_key,
            ..
        }) => {
            tracing::info!(provider, %source_key, "done");
            Ok(())
        }
        Ok(RunOutcome::Exhausted) => {
            tracing::info!("no tomato artwork found from any source");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = ?e, "run failed");
            Err(e)
        }
    }
}
