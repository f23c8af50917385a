//! Tweet text normalization
//!
//! Canonicalizes raw text so that duplicate detection and the classifier are
//! not thrown off by cosmetic differences. Steps run in a fixed order:
//!
//! 1. emoji → `:emoji_<hex>:` token
//! 2. leading `RT` marker removed
//! 3. URLs removed
//! 4. typographic quotes → ASCII quotes
//! 5. bullets/chevrons (and bare `&gt`/`&lt` entities) → ASCII
//! 6. runs of dash-like characters → single `-`
//! 7. trim, then collapse all whitespace to single spaces

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:[\x{1F1E6}-\x{1F1FF}]{2}|\p{Extended_Pictographic}(?:\x{FE0F}|\p{Emoji_Modifier}|\x{200D}\p{Extended_Pictographic}\x{FE0F}?)*)",
    )
    .unwrap()
});
static RE_RETWEET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^RT").unwrap());
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static RE_DOUBLE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[“”„]").unwrap());
static RE_SINGLE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[‘’‚]").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•‣◦]").unwrap());
static RE_RIGHT_CHEVRON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:›|»|&gt)").unwrap());
static RE_LEFT_CHEVRON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:‹|«|&lt)").unwrap());
static RE_DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-‐‑‒–—―]{2,}").unwrap());

/// Normalize a raw tweet body
///
/// Total and deterministic: every input yields an output, and the same input
/// always yields the same output.
pub fn normalize(raw: &str) -> String {
    let text = RE_EMOJI.replace_all(raw, |caps: &Captures| emoji_token(&caps[0]));
    let text = RE_RETWEET.replace(&text, "");
    let text = RE_URL.replace_all(&text, "");
    let text = RE_DOUBLE_QUOTE.replace_all(&text, "\"");
    let text = RE_SINGLE_QUOTE.replace_all(&text, "'");
    let text = RE_BULLET.replace_all(&text, "-");
    let text = RE_RIGHT_CHEVRON.replace_all(&text, ">");
    let text = RE_LEFT_CHEVRON.replace_all(&text, "<");
    let text = RE_DASH_RUN.replace_all(&text, "-");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable textual token for one emoji sequence
///
/// Variation selectors are dropped so that `❤` and `❤️` map to the same token.
fn emoji_token(sequence: &str) -> String {
    let codes: Vec<String> = sequence
        .chars()
        .filter(|c| *c != '\u{FE0F}')
        .map(|c| format!("{:x}", c as u32))
        .collect();
    format!(":emoji_{}:", codes.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize("Goeiemorgen Vlaanderen"), "Goeiemorgen Vlaanderen");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn test_emoji_replaced_with_token() {
        assert_eq!(normalize("mooi weer 😀"), "mooi weer :emoji_1f600:");
    }

    #[test]
    fn test_emoji_variation_selector_is_ignored() {
        assert_eq!(normalize("❤"), normalize("❤\u{FE0F}"));
        assert_eq!(normalize("❤"), ":emoji_2764:");
    }

    #[test]
    fn test_flag_is_single_token() {
        assert_eq!(normalize("🇧🇪"), ":emoji_1f1e7_1f1ea:");
    }

    #[test]
    fn test_leading_retweet_marker_removed() {
        assert_eq!(normalize("RT @vrt: nieuws"), "@vrt: nieuws");
        // Only at the very start
        assert_eq!(normalize("niet RT hier"), "niet RT hier");
    }

    #[test]
    fn test_urls_removed() {
        assert_eq!(
            normalize("lees dit https://t.co/abc123 en http://example.be/x?y=1 nu"),
            "lees dit en nu"
        );
    }

    #[test]
    fn test_url_does_not_swallow_next_line() {
        assert_eq!(normalize("https://t.co/abc\nvolgende regel"), "volgende regel");
    }

    #[test]
    fn test_typographic_quotes() {
        assert_eq!(normalize("“hallo” ‘daar’ it’s"), "\"hallo\" 'daar' it's");
    }

    #[test]
    fn test_bullets_and_chevrons() {
        assert_eq!(normalize("• punt › verder ‹ terug"), "- punt > verder < terug");
        assert_eq!(normalize("a &gt b &lt c"), "a > b < c");
    }

    #[test]
    fn test_dash_runs_collapsed() {
        assert_eq!(normalize("a---b"), "a-b");
        assert_eq!(normalize("a -- b —— c"), "a - b - c");
        assert_eq!(normalize("a-b"), "a-b");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize("  een\n\ntwee\t drie  "), "een twee drie");
    }

    #[test]
    fn test_cosmetic_variants_normalize_equal() {
        let a = normalize("RT “Goed nieuws”  https://t.co/x");
        let b = normalize("\"Goed nieuws\"\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_deterministic() {
        let input = "RT 🎉 feest • vandaag --- https://x.y";
        assert_eq!(normalize(input), normalize(input));
    }
}
