//! Text cleaning for speech synthesis
//!
//! [`TextNormalizer::normalize`] rewrites arbitrary text into something a
//! synthesizer can pronounce: line breaks become pauses, emoji disappear,
//! symbols and abbreviations are spelled out, links and contact details are
//! replaced by short phrases. [`TextNormalizer::normalize_strict`] adds a
//! final ASCII allow-list pass and is what the orchestrator runs on every
//! chunk right before synthesis.

use super::symbols::{self, SUBSTITUTIONS};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+"#).expect("valid URL pattern")
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year pattern"));

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("valid phone pattern"));

static GROUPED_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}(?:,\d{3})+\b").expect("valid number pattern"));

static HORIZONTAL_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("valid whitespace pattern"));

static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("valid newline pattern"));

/// Characters stripped from the end of a URL match and kept in the text.
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

/// Which optional steps run. Line-ending and whitespace cleanup always run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    pub remove_emojis: bool,
    pub replace_special_chars: bool,
    pub normalize_unicode: bool,
    pub clean_urls_emails: bool,
    pub improve_numbers: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            remove_emojis: true,
            replace_special_chars: true,
            normalize_unicode: true,
            clean_urls_emails: true,
            improve_numbers: true,
        }
    }
}

/// Statistics for one normalization call. Purely descriptive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// Input length in characters
    pub original_length: usize,
    /// Output length in characters
    pub final_length: usize,
    pub emojis_removed: usize,
    pub special_chars_replaced: usize,
    /// Characters dropped by the allow-list pass (strict mode only)
    pub unsupported_chars_removed: usize,
    /// Human-readable description of each applied step, in order
    pub steps: Vec<String>,
}

impl NormalizationReport {
    pub fn length_change(&self) -> i64 {
        self.final_length as i64 - self.original_length as i64
    }
}

/// Deterministic text cleaner. Holds only its options, so one value can be
/// shared freely across threads and sessions.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    options: NormalizerOptions,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NormalizerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    /// Clean `text` for synthesis. Never fails; empty input yields empty
    /// output and an empty report.
    pub fn normalize(&self, text: &str) -> (String, NormalizationReport) {
        let mut report = NormalizationReport::default();
        if text.is_empty() {
            return (String::new(), report);
        }
        report.original_length = text.chars().count();

        let mut text = normalize_line_endings(text);
        report.steps.push("Line endings normalized".to_string());

        if self.options.normalize_unicode {
            text = normalize_unicode(&text);
            report.steps.push("Unicode normalized".to_string());
        }

        if self.options.remove_emojis {
            let (cleaned, removed) = remove_emojis(&text);
            text = cleaned;
            report.emojis_removed = removed;
            if removed > 0 {
                report.steps.push(format!("Removed {} emojis", removed));
            }
        }

        if self.options.replace_special_chars {
            let (replaced, count) = replace_special_characters(&text);
            text = replaced;
            report.special_chars_replaced = count;
            if count > 0 {
                report
                    .steps
                    .push(format!("Replaced {} special characters", count));
            }
        }

        if self.options.clean_urls_emails {
            text = replace_urls_and_emails(&text);
            report.steps.push("URLs and emails processed".to_string());
        }

        if self.options.improve_numbers {
            text = smooth_numbers(&text);
            report.steps.push("Numbers and dates improved".to_string());
        }

        text = clean_whitespace(&text);
        report.steps.push("Whitespace cleaned".to_string());

        report.final_length = text.chars().count();
        log::info!(
            "Text preprocessing complete: {} steps applied ({} -> {} chars)",
            report.steps.len(),
            report.original_length,
            report.final_length
        );

        (text, report)
    }

    /// [`normalize`](Self::normalize) followed by the synthesis allow-list.
    /// The output contains only ASCII letters, digits, space, tab and
    /// `.,!?;:-()[]"'`.
    pub fn normalize_strict(&self, text: &str) -> (String, NormalizationReport) {
        let (normalized, mut report) = self.normalize(text);
        if normalized.is_empty() {
            return (normalized, report);
        }

        let removed = normalized
            .chars()
            .filter(|c| !symbols::is_synthesis_safe(*c))
            .count();
        let sanitized = sanitize_for_synthesis(&normalized);

        report.unsupported_chars_removed = removed;
        report
            .steps
            .push("Filtered to synthesis-safe characters".to_string());
        report.final_length = sanitized.chars().count();
        (sanitized, report)
    }
}

/// Replace every character outside the synthesis allow-list with a space,
/// then collapse whitespace. Line breaks become sentence pauses first.
pub fn sanitize_for_synthesis(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text.replace('\n', ". ");
    let filtered: String = text
        .chars()
        .map(|c| if symbols::is_synthesis_safe(c) { c } else { ' ' })
        .collect();
    HORIZONTAL_WHITESPACE
        .replace_all(&filtered, " ")
        .trim()
        .to_string()
}

fn normalize_line_endings(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    // Paragraph breaks become a sentence pause unless one is already there.
    let mut joined = String::with_capacity(text.len());
    for (idx, paragraph) in text.split("\n\n").enumerate() {
        if idx > 0 {
            let previous = joined.trim_end();
            if previous.is_empty() || previous.ends_with(['.', '!', '?']) {
                joined.push(' ');
            } else {
                joined.push_str(". ");
            }
        }
        joined.push_str(paragraph);
    }
    joined.replace('\n', " ")
}

fn normalize_unicode(text: &str) -> String {
    text.nfd()
        .nfc()
        .filter(|&c| {
            let control = c.is_control() && c != '\n' && c != '\t';
            !control && !symbols::is_format_or_private(c)
        })
        .collect()
}

fn remove_emojis(text: &str) -> (String, usize) {
    let mut removed = 0;
    let cleaned = text
        .chars()
        .map(|c| {
            if symbols::is_removable_symbol(c) {
                removed += 1;
                ' '
            } else {
                c
            }
        })
        .collect();
    (cleaned, removed)
}

/// Single left-to-right pass over the substitution table. Output of one
/// substitution is never rescanned, and URL/email spans are copied
/// verbatim so the link step can still recognise them.
fn replace_special_characters(text: &str) -> (String, usize) {
    let mut protected: Vec<(usize, usize)> = URL_PATTERN
        .find_iter(text)
        .chain(EMAIL_PATTERN.find_iter(text))
        .map(|m| (m.start(), m.end()))
        .collect();
    protected.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut pos = 0;
    let mut spans = protected.into_iter().peekable();

    while pos < text.len() {
        while spans.peek().is_some_and(|&(_, end)| end <= pos) {
            spans.next();
        }
        let limit = match spans.peek() {
            Some(&(start, end)) if start <= pos => {
                out.push_str(&text[pos..end]);
                pos = end;
                continue;
            }
            Some(&(start, _)) => start,
            None => text.len(),
        };

        let rest = &text[pos..limit];
        let substitution = SUBSTITUTIONS
            .iter()
            .find(|(from, _)| rest.starts_with(from) && is_word_bounded(text, pos, from));
        if let Some((from, to)) = substitution {
            out.push_str(to);
            count += 1;
            pos += from.len();
            continue;
        }

        let Some(c) = rest.chars().next() else {
            break;
        };
        out.push(c);
        pos += c.len_utf8();
    }

    (out, count)
}

/// Alphanumeric edges of a key must not touch other alphanumerics, so
/// `JS` is not rewritten inside `JSON`.
fn is_word_bounded(text: &str, start: usize, key: &str) -> bool {
    let end = start + key.len();
    let head_ok = !key.starts_with(char::is_alphanumeric)
        || text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
    let tail_ok = !key.ends_with(char::is_alphanumeric)
        || text[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
    head_ok && tail_ok
}

fn replace_urls_and_emails(text: &str) -> String {
    let text = URL_PATTERN.replace_all(text, |caps: &Captures| {
        let url = &caps[0];
        let kept = url.trim_end_matches(URL_TRAILING_PUNCTUATION);
        format!(" web link{} ", &url[kept.len()..])
    });
    EMAIL_PATTERN
        .replace_all(&text, " email address ")
        .into_owned()
}

fn smooth_numbers(text: &str) -> String {
    let text = YEAR_PATTERN.replace_all(text, " $0 ");
    let text = PHONE_PATTERN.replace_all(&text, " phone number ");
    GROUPED_NUMBER_PATTERN
        .replace_all(&text, |caps: &Captures| caps[0].replace(',', " "))
        .into_owned()
}

fn clean_whitespace(text: &str) -> String {
    let text = HORIZONTAL_WHITESPACE.replace_all(text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(text: &str) -> String {
        TextNormalizer::new().normalize(text).0
    }

    #[test]
    fn test_empty_input() {
        let (text, report) = TextNormalizer::new().normalize("");
        assert!(text.is_empty());
        assert_eq!(report, NormalizationReport::default());
    }

    #[test]
    fn test_mixed_content_scenario() {
        let input =
            "Hello world! \u{1F600} Visit https://example.com or call 555-123-4567. It costs 20%.";
        let (text, report) = TextNormalizer::new().normalize(input);

        assert!(text.contains("Hello world!"));
        assert!(!text.contains('\u{1F600}'));
        assert!(text.contains("web link"));
        assert!(!text.contains("https://"));
        assert!(text.contains("phone number"));
        assert!(!text.contains("4567"));
        assert!(text.contains("percent"));
        assert!(!text.contains('%'));
        assert_eq!(report.emojis_removed, 1);
        assert!(report.special_chars_replaced >= 1);
    }

    #[test]
    fn test_line_endings_become_pauses() {
        assert_eq!(normalize("First line\r\nsecond line"), "First line second line");
        assert_eq!(normalize("Heading\n\nBody text"), "Heading. Body text");
        assert_eq!(normalize("Done.\n\nNext part"), "Done. Next part");
        assert_eq!(normalize("old\rmac"), "old mac");
    }

    #[test]
    fn test_smart_punctuation_is_ascii() {
        let text = normalize("\u{201C}Quoted\u{201D} \u{2014} it\u{2019}s fine\u{2026}");
        assert_eq!(text, "\"Quoted\" - it's fine...");
    }

    #[test]
    fn test_abbreviations_expand() {
        assert_eq!(normalize("Dr. Smith met Mr. Jones"), "Doctor Smith met Mister Jones");
        assert_eq!(normalize("fruit, e.g. apples"), "fruit, for example apples");
    }

    #[test]
    fn test_substitution_respects_word_edges() {
        assert_eq!(normalize("parse JSON with JS"), "parse JSON with JavaScript");
        assert_eq!(normalize("GUIDE"), "GUIDE");
    }

    #[test]
    fn test_substitution_output_not_rescanned() {
        // "U R L" must not be rescanned into anything else
        let (_, report) = TextNormalizer::new().normalize("URL & API");
        assert_eq!(report.special_chars_replaced, 3);
    }

    #[test]
    fn test_email_survives_at_sign_substitution() {
        let text = normalize("Write to jane.doe@example.org today");
        assert_eq!(text, "Write to email address today");
    }

    #[test]
    fn test_url_keeps_query_and_sentence_end() {
        let text = normalize("See https://example.com/a?b=1&c=2. Then stop");
        assert_eq!(text, "See web link. Then stop");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(normalize("Population 1,234,567"), "Population 1 234 567");
        assert_eq!(normalize("In1999we"), "In1999we");
        assert_eq!(normalize("It was 1999."), "It was 1999 .");
    }

    #[test]
    fn test_control_characters_stripped() {
        assert_eq!(normalize("a\u{0007}b\u{200B}c"), "abc");
    }

    #[test]
    fn test_unicode_recomposed() {
        assert_eq!(normalize("cafe\u{301}"), "caf\u{e9}");
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let normalizer = TextNormalizer::with_options(NormalizerOptions {
            remove_emojis: false,
            replace_special_chars: false,
            ..NormalizerOptions::default()
        });
        let (text, report) = normalizer.normalize("50% \u{1F600}");
        assert!(text.contains('%'));
        assert!(text.contains('\u{1F600}'));
        assert_eq!(report.emojis_removed, 0);
        assert!(!report.steps.iter().any(|s| s.starts_with("Removed")));
    }

    #[test]
    fn test_report_counts() {
        let (text, report) = TextNormalizer::new().normalize("\u{1F600}\u{1F601} 100%");
        assert_eq!(report.emojis_removed, 2);
        assert_eq!(report.original_length, 7);
        assert_eq!(report.final_length, text.chars().count());
        assert_eq!(report.length_change(), text.chars().count() as i64 - 7);
        assert_eq!(report.steps.first().map(String::as_str), Some("Line endings normalized"));
        assert_eq!(report.steps.last().map(String::as_str), Some("Whitespace cleaned"));
    }

    #[test]
    fn test_strict_output_is_allow_listed() {
        let inputs = [
            "Na\u{ef}ve caf\u{e9} \u{2192} \u{4e2d}\u{6587} \u{1F680}!",
            "Tabs\tand\nnewlines\r\nand \u{20AC}5 * 3 = 15 <tag> {x}",
            "\u{2603}\u{fe0f} \u{1F1FA}\u{1F1F8} ~^_|\\/",
        ];
        let normalizer = TextNormalizer::new();
        for input in inputs {
            let (text, report) = normalizer.normalize_strict(input);
            assert!(
                text.chars().all(symbols::is_synthesis_safe),
                "unexpected character in {:?}",
                text
            );
            assert_eq!(report.final_length, text.chars().count());
        }
    }

    #[test]
    fn test_strict_counts_removed_characters() {
        let (text, report) = TextNormalizer::new().normalize_strict("caf\u{e9} * bar");
        assert_eq!(text, "caf bar");
        assert_eq!(report.unsupported_chars_removed, 2);
    }

    #[test]
    fn test_sanitize_for_synthesis() {
        assert_eq!(sanitize_for_synthesis("one\ntwo"), "one. two");
        assert_eq!(sanitize_for_synthesis("  a  *  b  "), "a b");
    }
}
