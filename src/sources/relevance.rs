// src/sources/relevance.rs
//! Per-source subject relevance predicate.
//!
//! Sources differ in how much their keyword search can be trusted, so the
//! rule is data, not code: either trust the search engine outright or require
//! one of `keywords` as a case-insensitive substring of the named fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RelevanceRule {
    /// Every search hit counts as relevant.
    TrustSearch,
    /// At least one keyword must occur in at least one of the named fields.
    Substring {
        keywords: Vec<String>,
        fields: Vec<String>,
    },
}

impl RelevanceRule {
    pub fn substring<K, F>(keywords: K, fields: F) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        RelevanceRule::Substring {
            keywords: keywords.into_iter().map(Into::into).collect(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// `record` lists `(field name, text)` pairs the source can offer. Fields the
    /// rule names but the record lacks are treated as empty.
    pub fn matches(&self, record: &[(&str, String)]) -> bool {
        match self {
            RelevanceRule::TrustSearch => true,
            RelevanceRule::Substring { keywords, fields } => {
                let haystack = record
                    .iter()
                    .filter(|(name, _)| fields.iter().any(|f| f.eq_ignore_ascii_case(name)))
                    .map(|(_, text)| text.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ");
                keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .any(|k| haystack.contains(&k))
            }
        }
    }
}
