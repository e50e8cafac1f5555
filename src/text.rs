//! Text normalization for risk analysis
//!
//! Cleans raw post text the same way the training data was cleaned before
//! labeling, and validates that an input is worth analyzing at all. The
//! prediction core itself never touches raw text; everything goes through
//! here first.

use crate::error::{Error, Result};
use regex::{Captures, Regex};

/// Cleaned text longer than this is cut and ellipsized.
const MAX_CLEANED_CHARS: usize = 500;

const MIN_INPUT_CHARS: usize = 3;
const MAX_INPUT_CHARS: usize = 2000;

/// Stateless text cleaner. Holds its compiled patterns; build one at
/// startup and share it.
pub struct TextCleaner {
    entity: Regex,
    url: Regex,
    mention: Regex,
    hashtag: Regex,
    whitespace: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            entity: compile(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);")?,
            url: compile(r"http\S+|www\S+|https\S+")?,
            mention: compile(r"@\w+")?,
            hashtag: compile(r"#(\w+)")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Normalize raw text: decode HTML entities, strip URLs and mentions,
    /// keep hashtag content without the `#`, collapse whitespace, and cap
    /// the length.
    pub fn clean_for_analysis(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let text = self
            .entity
            .replace_all(text, |caps: &Captures| decode_entity(&caps[1]))
            .into_owned();
        let text = self.url.replace_all(&text, "");
        let text = self.mention.replace_all(&text, "");
        let text = self.hashtag.replace_all(&text, "$1");
        let text = self.whitespace.replace_all(&text, " ");
        let mut text = text.trim().to_string();

        if text.len() > MAX_CLEANED_CHARS {
            let mut cut = MAX_CLEANED_CHARS;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("...");
        }

        text
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config(format!("invalid text pattern: {e}")))
}

/// Decode one HTML entity body (without `&` and `;`). Unknown entities are
/// returned unchanged.
fn decode_entity(body: &str) -> String {
    let decoded = match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "hellip" => Some('\u{2026}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "lsquo" => Some('\u{2018}'),
        "rsquo" => Some('\u{2019}'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        _ => decode_numeric_entity(body),
    };

    match decoded {
        Some(c) => c.to_string(),
        None => format!("&{body};"),
    }
}

fn decode_numeric_entity(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Validate text before it reaches the prediction service.
pub fn validate_input(text: &str) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("text input is required"));
    }
    if trimmed.chars().count() < MIN_INPUT_CHARS {
        return Err(Error::invalid_input(
            "text is too short for meaningful analysis",
        ));
    }
    if text.chars().count() > MAX_INPUT_CHARS {
        return Err(Error::invalid_input(format!(
            "text is too long (maximum {MAX_INPUT_CHARS} characters)"
        )));
    }

    let distinct_words = text
        .to_lowercase()
        .split_whitespace()
        .collect::<std::collections::HashSet<_>>()
        .len();
    if distinct_words < 2 {
        return Err(Error::invalid_input(
            "text appears to be repetitive or nonsensical",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new().unwrap()
    }

    #[test]
    fn test_strips_urls_and_mentions() {
        let cleaned = cleaner().clean_for_analysis(
            "feeling down today https://example.com/post @someone please read",
        );
        assert_eq!(cleaned, "feeling down today please read");
    }

    #[test]
    fn test_unwraps_hashtags() {
        let cleaned = cleaner().clean_for_analysis("#anxiety is winning today");
        assert_eq!(cleaned, "anxiety is winning today");
    }

    #[test]
    fn test_decodes_html_entities() {
        let cleaned = cleaner().clean_for_analysis("I can&#39;t sleep &amp; it&apos;s 3am");
        assert_eq!(cleaned, "I can't sleep & it's 3am");
    }

    #[test]
    fn test_unknown_entity_left_alone() {
        let cleaned = cleaner().clean_for_analysis("a &bogus; entity here");
        assert_eq!(cleaned, "a &bogus; entity here");
    }

    #[test]
    fn test_collapses_whitespace() {
        let cleaned = cleaner().clean_for_analysis("  too\t\tmany   spaces \n here ");
        assert_eq!(cleaned, "too many spaces here");
    }

    #[test]
    fn test_caps_length_with_ellipsis() {
        let long = "word ".repeat(200);
        let cleaned = cleaner().clean_for_analysis(&long);
        assert!(cleaned.len() <= MAX_CLEANED_CHARS + 3);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_empty_input_cleans_to_empty() {
        assert_eq!(cleaner().clean_for_analysis("   "), "");
    }

    #[test]
    fn test_validate_rejects_empty_and_short() {
        assert!(validate_input("").is_err());
        assert!(validate_input("hi").is_err());
    }

    #[test]
    fn test_validate_rejects_too_long() {
        let long = "a ".repeat(1500);
        assert!(validate_input(&long).is_err());
    }

    #[test]
    fn test_validate_rejects_repetitive() {
        assert!(validate_input("help help help help").is_err());
    }

    #[test]
    fn test_validate_accepts_normal_text() {
        assert!(validate_input("I have been feeling overwhelmed lately").is_ok());
    }
}
