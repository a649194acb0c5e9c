// src/caption.rs
//! Caption composition under a hard character budget.

use once_cell::sync::OnceCell;
use regex::Regex;

pub const DEFAULT_MAX_TEXT_LEN: usize = 300;
pub const DEFAULT_ALT_TEXT_LEN: usize = 300;
pub const DEFAULT_HASHTAGS: &str = "#tomato #art";

const ELLIPSIS: char = '…';

/// Joins caption lines and appends the hashtag suffix, truncating the body
/// (never the suffix) so the result fits `max_len` characters.
#[derive(Debug, Clone)]
pub struct CaptionBuilder {
    max_len: usize,
    suffix: String,
}

impl Default for CaptionBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_LEN, DEFAULT_HASHTAGS)
    }
}

impl CaptionBuilder {
    /// `hashtags` is placed after a blank line; an empty string means no suffix.
    pub fn new(max_len: usize, hashtags: &str) -> Self {
        let tags = hashtags.trim();
        let suffix = if tags.is_empty() {
            String::new()
        } else {
            format!("\n\n{tags}")
        };
        Self { max_len, suffix }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn build<S: AsRef<str>>(&self, lines: &[S]) -> String {
        let base = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        self.add_hashtag_suffix(&base)
    }

    pub fn add_hashtag_suffix(&self, base_text: &str) -> String {
        let base = base_text.trim();
        let suffix_len = self.suffix.chars().count();

        if base.chars().count() + suffix_len <= self.max_len {
            return format!("{base}{}", self.suffix);
        }

        // One char is reserved for the ellipsis.
        let allowed = self.max_len.saturating_sub(suffix_len + 1);
        if allowed == 0 {
            return truncate_chars(self.suffix.trim(), self.max_len).to_string();
        }

        let head = truncate_chars(base, allowed).trim_end();
        format!("{head}{ELLIPSIS}{}", self.suffix)
    }
}

/// Alt text is the final post text cut at the alt-text ceiling.
pub fn alt_text(text: &str, max_len: usize) -> String {
    truncate_chars(text, max_len).to_string()
}

/// Longest prefix of `s` with at most `max` chars (always on a char boundary).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Clean one metadata field from a museum record: decode HTML entities,
/// strip tags, fold typographic quotes, collapse whitespace.
pub fn clean_field(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn short_caption_is_joined_with_suffix() {
        let b = CaptionBuilder::default();
        let lines = ["Still Life with Tomato", "J. Doe", "1920", "Source: X"];
        let out = b.build(&lines);
        assert_eq!(
            out,
            "Still Life with Tomato\nJ. Doe\n1920\nSource: X\n\n#tomato #art"
        );
        assert!(len(&out) <= 300);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let b = CaptionBuilder::new(40, "#t");
        let base = "a".repeat(40 - 4);
        let out = b.add_hashtag_suffix(&base);
        assert_eq!(out, format!("{base}\n\n#t"));
        assert_eq!(len(&out), 40);
    }

    #[test]
    fn overlong_base_keeps_suffix_verbatim() {
        let b = CaptionBuilder::default();
        let base = "tomato ".repeat(50);
        let base = truncate_chars(&base, 350).to_string();
        let out = b.add_hashtag_suffix(&base);
        assert!(out.ends_with("\n\n#tomato #art"));
        assert!(len(&out) <= 300);
        assert!(out.contains('…'));
        assert!(!out.contains(" …"), "trailing whitespace is stripped before ellipsis");
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let b = CaptionBuilder::new(30, "#t");
        let out = b.add_hashtag_suffix(&"ト".repeat(100));
        assert_eq!(len(&out), 30);
        assert!(out.ends_with("…\n\n#t"));
    }

    #[test]
    fn tiny_budget_returns_bare_suffix() {
        let b = CaptionBuilder::new(14, "#tomato #art");
        assert_eq!(b.add_hashtag_suffix("Some long title here"), "#tomato #art");

        let b = CaptionBuilder::new(5, "#tomato #art");
        assert_eq!(b.add_hashtag_suffix("Title"), "#toma");
    }

    #[test]
    fn empty_hashtags_mean_no_suffix() {
        let b = CaptionBuilder::new(10, "  ");
        assert_eq!(b.build(&["Tomato"]), "Tomato");
        assert_eq!(b.build(&["Tomatoes on a plate"]), "Tomatoes…");
    }

    #[test]
    fn budget_holds_for_many_lengths() {
        let b = CaptionBuilder::default();
        for n in [0usize, 1, 100, 285, 286, 287, 299, 300, 301, 350, 1000] {
            let out = b.add_hashtag_suffix(&"x".repeat(n));
            assert!(len(&out) <= 300, "n={n} produced {}", len(&out));
            assert!(out.ends_with(b.suffix()));
        }
    }

    #[test]
    fn alt_text_is_capped() {
        assert_eq!(alt_text("abcdef", 3), "abc");
        assert_eq!(alt_text("ab", 3), "ab");
    }

    #[test]
    fn clean_field_strips_markup_and_whitespace() {
        let s = "  <p>Two&nbsp;<em>tomatoes</em></p>\n\n on a &ldquo;plate&rdquo; ";
        assert_eq!(clean_field(s), r#"Two tomatoes on a "plate""#);
        assert_eq!(clean_field("   "), "");
    }
}
