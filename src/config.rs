// src/config.rs
//! Run configuration, built once at startup and passed down explicitly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::caption::{DEFAULT_ALT_TEXT_LEN, DEFAULT_HASHTAGS, DEFAULT_MAX_TEXT_LEN};
use crate::imaging::DEFAULT_SIZE_LIMIT;
use crate::ledger::DEFAULT_LEDGER_PATH;
use crate::sources::fetch::DEFAULT_TIMEOUT_SECS;
use crate::sources::relevance::RelevanceRule;
use crate::sources::{cma, cooper, met};

// --- env names ---
pub const ENV_LEDGER_PATH: &str = "TOMATO_LEDGER_PATH";
pub const ENV_MAX_TEXT_LEN: &str = "TOMATO_MAX_TEXT_LEN";
pub const ENV_ALT_TEXT_LEN: &str = "TOMATO_ALT_TEXT_LEN";
pub const ENV_IMAGE_SIZE_LIMIT: &str = "TOMATO_IMAGE_SIZE_LIMIT";
pub const ENV_HASHTAGS: &str = "TOMATO_HASHTAGS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "TOMATO_HTTP_TIMEOUT_SECS";
pub const ENV_RNG_SEED: &str = "TOMATO_RNG_SEED";
pub const ENV_SOURCES_CONFIG: &str = "TOMATO_SOURCES_CONFIG";
pub const ENV_COOPER_API_KEY: &str = "COOPER_API_KEY";
pub const ENV_BSKY_HANDLE: &str = "BSKY_HANDLE";
pub const ENV_BSKY_APP_PASSWORD: &str = "BSKY_APP_PASSWORD";
pub const ENV_BSKY_PDS_URL: &str = "BSKY_PDS_URL";
pub const ENV_LOG_JSON: &str = "TOMATO_LOG_JSON";

pub const DEFAULT_SOURCES_CONFIG_PATH: &str = "config/sources.toml";
pub const DEFAULT_BSKY_PDS_URL: &str = "https://bsky.social";

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub ledger_path: PathBuf,
    pub max_text_len: usize,
    pub alt_text_len: usize,
    pub image_size_limit: usize,
    pub hashtags: String,
    pub http_timeout_secs: u64,
    /// Fixed seed for provider order and shuffles; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
    pub cooper_api_key: Option<String>,
    pub bluesky: BlueskySettings,
    pub sources: SourcesConfig,
}

#[derive(Clone)]
pub struct BlueskySettings {
    pub handle: Option<String>,
    pub app_password: Option<String>,
    pub pds_url: String,
}

impl std::fmt::Debug for BlueskySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueskySettings")
            .field("handle", &self.handle)
            .field("app_password", &self.app_password.as_ref().map(|_| "***"))
            .field("pds_url", &self.pds_url)
            .finish()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            alt_text_len: DEFAULT_ALT_TEXT_LEN,
            image_size_limit: DEFAULT_SIZE_LIMIT,
            hashtags: DEFAULT_HASHTAGS.to_string(),
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            rng_seed: None,
            cooper_api_key: None,
            bluesky: BlueskySettings {
                handle: None,
                app_password: None,
                pds_url: DEFAULT_BSKY_PDS_URL.to_string(),
            },
            sources: SourcesConfig::default(),
        }
    }
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Blank values count as unset; malformed
    /// numbers fall back to defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let d = Self::default();

        let sources = match get(ENV_SOURCES_CONFIG) {
            Some(p) => SourcesConfig::load_or_default(Path::new(&p), true),
            None => SourcesConfig::load_or_default(Path::new(DEFAULT_SOURCES_CONFIG_PATH), false),
        };

        Self {
            ledger_path: get(ENV_LEDGER_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.ledger_path),
            max_text_len: parse_or(ENV_MAX_TEXT_LEN, get(ENV_MAX_TEXT_LEN), d.max_text_len),
            alt_text_len: parse_or(ENV_ALT_TEXT_LEN, get(ENV_ALT_TEXT_LEN), d.alt_text_len),
            image_size_limit: parse_or(
                ENV_IMAGE_SIZE_LIMIT,
                get(ENV_IMAGE_SIZE_LIMIT),
                d.image_size_limit,
            ),
            // An explicitly empty value disables hashtags, so read it raw.
            hashtags: lookup(ENV_HASHTAGS).unwrap_or(d.hashtags),
            http_timeout_secs: parse_or(
                ENV_HTTP_TIMEOUT_SECS,
                get(ENV_HTTP_TIMEOUT_SECS),
                d.http_timeout_secs,
            ),
            rng_seed: get(ENV_RNG_SEED).and_then(|v| match v.parse() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    warn!(var = ENV_RNG_SEED, value = %v, "invalid seed; using OS entropy");
                    None
                }
            }),
            cooper_api_key: get(ENV_COOPER_API_KEY),
            bluesky: BlueskySettings {
                handle: get(ENV_BSKY_HANDLE),
                app_password: get(ENV_BSKY_APP_PASSWORD),
                pds_url: get(ENV_BSKY_PDS_URL).unwrap_or(d.bluesky.pds_url),
            },
            sources,
        }
    }
}

/// `TOMATO_LOG_JSON=1` (or `true`) switches the binary to JSON log lines.
pub fn json_logs_requested<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_LOG_JSON).is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(var: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            warn!(var, value = %v, %default, "invalid number; using default");
            default
        }),
    }
}

/// Search terms and relevance rule for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub enabled: bool,
    pub terms: Vec<String>,
    pub relevance: RelevanceRule,
}

impl SourceSettings {
    pub fn new<T: Into<String>>(terms: impl IntoIterator<Item = T>, relevance: RelevanceRule) -> Self {
        Self {
            enabled: true,
            terms: terms.into_iter().map(Into::into).collect(),
            relevance,
        }
    }

    fn apply(&mut self, o: SourceOverride) {
        if let Some(e) = o.enabled {
            self.enabled = e;
        }
        if let Some(t) = o.terms {
            let t: Vec<String> = t
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !t.is_empty() {
                self.terms = t;
            }
        }
        if let Some(r) = o.relevance {
            self.relevance = r;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesConfig {
    pub met: SourceSettings,
    pub cma: SourceSettings,
    pub cooper: SourceSettings,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            met: met::default_settings(),
            cma: cma::default_settings(),
            cooper: cooper::default_settings(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceOverride {
    enabled: Option<bool>,
    terms: Option<Vec<String>>,
    relevance: Option<RelevanceRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourcesFile {
    met: Option<SourceOverride>,
    cma: Option<SourceOverride>,
    cooper: Option<SourceOverride>,
}

impl SourcesConfig {
    /// Parse TOML overrides on top of the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SourcesFile = toml::from_str(s).context("parsing sources config")?;
        let mut cfg = Self::default();
        if let Some(o) = file.met {
            cfg.met.apply(o);
        }
        if let Some(o) = file.cma {
            cfg.cma.apply(o);
        }
        if let Some(o) = file.cooper {
            cfg.cooper.apply(o);
        }
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// A missing file is only worth a warning when it was asked for explicitly.
    /// Unreadable or invalid files are logged and ignored.
    pub fn load_or_default(path: &Path, explicit: bool) -> Self {
        if !path.exists() {
            if explicit {
                warn!(path = %path.display(), "sources config not found; using defaults");
            }
            return Self::default();
        }
        Self::load_from(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = ?e, "sources config ignored");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let c = BotConfig::from_lookup(lookup(&[(ENV_SOURCES_CONFIG, "/nonexistent.toml")]));
        assert_eq!(c.ledger_path, PathBuf::from("posted_ids.json"));
        assert_eq!(c.max_text_len, 300);
        assert_eq!(c.image_size_limit, 950_000);
        assert_eq!(c.hashtags, "#tomato #art");
        assert!(c.cooper_api_key.is_none());
        assert!(c.bluesky.handle.is_none());
        assert_eq!(c.bluesky.pds_url, DEFAULT_BSKY_PDS_URL);
        assert_eq!(c.sources, SourcesConfig::default());
    }

    #[test]
    fn values_and_bad_numbers() {
        let c = BotConfig::from_lookup(lookup(&[
            (ENV_SOURCES_CONFIG, "/nonexistent.toml"),
            (ENV_LEDGER_PATH, "state/seen.json"),
            (ENV_MAX_TEXT_LEN, "280"),
            (ENV_IMAGE_SIZE_LIMIT, "lots"),
            (ENV_RNG_SEED, "42"),
            (ENV_COOPER_API_KEY, "  "),
            (ENV_BSKY_HANDLE, "tomatoes.bsky.social"),
            (ENV_HASHTAGS, ""),
        ]));
        assert_eq!(c.ledger_path, PathBuf::from("state/seen.json"));
        assert_eq!(c.max_text_len, 280);
        assert_eq!(c.image_size_limit, 950_000);
        assert_eq!(c.rng_seed, Some(42));
        assert!(c.cooper_api_key.is_none(), "blank key counts as unset");
        assert_eq!(c.bluesky.handle.as_deref(), Some("tomatoes.bsky.social"));
        assert_eq!(c.hashtags, "");
    }

    #[test]
    fn json_log_switch() {
        assert!(!json_logs_requested(lookup(&[])));
        assert!(json_logs_requested(lookup(&[(ENV_LOG_JSON, "1")])));
        assert!(json_logs_requested(lookup(&[(ENV_LOG_JSON, " TRUE ")])));
        assert!(!json_logs_requested(lookup(&[(ENV_LOG_JSON, "0")])));
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let mut c = BotConfig::default();
        c.bluesky.app_password = Some("hunter2".into());
        assert!(!format!("{c:?}").contains("hunter2"));
    }

    #[test]
    fn toml_overrides_merge_onto_defaults() {
        let cfg = SourcesConfig::from_toml_str(
            r#"
[met]
terms = ["tomato", " ", "pomodoro"]

[cma]
enabled = false

[cooper.relevance]
mode = "substring"
keywords = ["tomato"]
fields = ["title", "description"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.met.terms, vec!["tomato", "pomodoro"]);
        assert_eq!(cfg.met.relevance, met::default_settings().relevance);
        assert!(!cfg.cma.enabled);
        assert_eq!(
            cfg.cooper.relevance,
            RelevanceRule::substring(["tomato"], ["title", "description"])
        );
    }

    #[test]
    fn invalid_sources_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("sources.toml");
        fs::write(&p, "[met]\nbogus = 1\n").unwrap();
        assert!(SourcesConfig::load_from(&p).is_err());
        assert_eq!(SourcesConfig::load_or_default(&p, true), SourcesConfig::default());
    }
}
