//! Text and number normalization. Every function here is pure and
//! side-effect-free; none of them touch the network or the filesystem, so
//! they're exercised directly in unit tests rather than through fixtures.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static NUMBER_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d*\.?\d+").unwrap());

static VALUE_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)\s*([a-zA-Z\u{00e5}\u{00e4}\u{00f6}\u{00c5}\u{00c4}\u{00d6}%]*)").unwrap());

/// Collapse any run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// Drop tags and unescape entity references, keeping only the text content.
/// Parsed as an HTML fragment rather than regex-stripped, so malformed
/// markup degrades the way a browser's text extraction would rather than
/// leaking half a tag.
pub fn strip_html(s: &str) -> String {
    let fragment = scraper::Html::parse_fragment(s);
    fragment.root_element().text().collect::<Vec<_>>().concat()
}

/// Fold to a deduplication key: lowercase, Swedish vowels folded to their
/// unaccented ASCII form, then any remaining combining marks stripped via
/// NFKD decomposition. Not meant for display — only for comparing two
/// strings that should be treated as "the same name".
pub fn normalize_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let folded: String = s
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{00e5}' => 'a',
            '\u{00e4}' => 'a',
            '\u{00f6}' => 'o',
            other => other,
        })
        .collect();
    let stripped: String = folded
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii())
        .collect();
    stripped.trim().to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

/// Extract the first numeric run as a price, accepting `.` or `,` as the
/// decimal separator and discarding thousand separators (plain or
/// non-breaking space). `None` when the input is empty or has no digits.
pub fn parse_price(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let cleaned = s.replace([' ', '\u{a0}'], "").replace(',', ".");
    let m = NUMBER_RUN_RE.find(&cleaned)?;
    m.as_str().parse::<f64>().ok()
}

/// Split into a leading number and a trailing alphabetic/`%` unit. Either
/// side may come back empty; this never fails outright.
pub fn parse_value_unit(s: &str) -> (String, String) {
    if s.is_empty() {
        return (String::new(), String::new());
    }
    let normalized = s.replace(',', ".");
    match VALUE_UNIT_RE.captures(&normalized) {
        Some(caps) => {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or("").trim().to_string();
            let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim().to_string();
            (value, unit)
        }
        None => (String::new(), String::new()),
    }
}

/// Labels recognized by `parse_measurements`, mapped to the canonical Swedish
/// label used in the emitted key. Kept as a data table rather than a chain of
/// `if`s, so widening the recognized vocabulary is a table edit.
static MEASUREMENT_LABELS: &[(&str, &str)] = &[
    ("L", "L\u{e4}ngd"),
    ("L\u{e4}ngd", "L\u{e4}ngd"),
    ("B", "Bredd"),
    ("Bredd", "Bredd"),
    ("H", "H\u{f6}jd"),
    ("H\u{f6}jd", "H\u{f6}jd"),
    ("D", "Djup"),
    ("Djup", "Djup"),
    ("\u{d8}", "Diameter"),
    ("Diameter", "Diameter"),
    ("Diam", "Diameter"),
    ("Diam.", "Diameter"),
    ("Kapacitet", "Kapacitet"),
    ("Volym", "Volym"),
    ("Vikt", "Vikt"),
];

fn canonical_label(token: &str) -> Option<&'static str> {
    MEASUREMENT_LABELS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(token))
        .map(|(_, v)| *v)
}

/// Public entry point onto the same label table `parse_measurements` uses,
/// for callers that see measurement labels one at a time (e.g. a product
/// page's labeled attribute rows) rather than as a single comma-separated
/// string. Returns the canonical Swedish label (`"Vikt"`, `"L\u{e4}ngd"`, ...)
/// when `token` names a measurement field, so such callers can route the
/// value onto the matching record field instead of packing it into
/// unmapped "extra" data.
pub fn canonical_measurement_label(token: &str) -> Option<&'static str> {
    canonical_label(token)
}

/// Split a comma-separated measurement string into `"<Label> (value)"` /
/// `"<Label> (unit)"` pairs. Unrecognized tokens fall back into a single
/// `"Mått (text)"` entry carrying the original string verbatim. If a label
/// appears more than once, the last occurrence wins.
pub fn parse_measurements(s: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    if s.is_empty() {
        return result;
    }
    for line in s.split(',') {
        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        let Some(&label_token) = parts.first() else {
            continue;
        };
        let rest = parts[1..].join(" ");
        let (value, unit) = parse_value_unit(&rest);
        match canonical_label(label_token) {
            Some(label) => {
                result.insert(format!("{label} (value)"), value);
                result.insert(format!("{label} (unit)"), unit);
            }
            None => {
                result.insert("M\u{e5}tt (text)".to_string(), s.to_string());
            }
        }
    }
    result
}

/// Keep only ASCII digit characters.
pub fn extract_only_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Extract the first decimal number as text (thousand separators and
/// non-breaking spaces discarded, `,` treated as the decimal separator).
/// Unlike `parse_price`, the result stays textual — callers that need a
/// numeric comparison should go through `parse_price` instead.
pub fn extract_first_decimal(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let cleaned = s.replace([' ', '\u{a0}'], "").replace(',', ".");
    NUMBER_RUN_RE.find(&cleaned).map(|m| m.as_str().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_collapses_and_trims() {
        assert_eq!(normalize_whitespace("  a\t b\n c  "), "a b c");
    }

    #[test]
    fn html_tags_dropped_and_entities_unescaped() {
        assert_eq!(strip_html("<p>hej &amp; d\u{e5}</p>"), "hej & d\u{e5}");
    }

    #[test]
    fn text_folds_swedish_vowels_and_case() {
        assert_eq!(normalize_text("\u{c5}ngbåt ÖRN"), "angbat orn");
    }

    #[test]
    fn empty_text_normalizes_to_empty() {
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn price_handles_thousand_separator_and_comma_decimal() {
        assert_eq!(parse_price("1 234,50 kr"), Some(1234.50));
    }

    #[test]
    fn price_is_none_for_empty_or_non_numeric() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("abc"), None);
    }

    #[test]
    fn value_unit_splits_number_from_trailing_unit() {
        assert_eq!(parse_value_unit("12 cm"), ("12".to_string(), "cm".to_string()));
        assert_eq!(parse_value_unit("10,5L"), ("10.5".to_string(), "L".to_string()));
    }

    #[test]
    fn value_unit_empty_input_is_empty_pair() {
        assert_eq!(parse_value_unit(""), (String::new(), String::new()));
    }

    #[test]
    fn measurements_recognizes_short_and_long_labels() {
        let result = parse_measurements("L 120 cm, B 60 cm, H\u{f6}jd 75 cm");
        assert_eq!(result.get("L\u{e4}ngd (value)").unwrap(), "120");
        assert_eq!(result.get("L\u{e4}ngd (unit)").unwrap(), "cm");
        assert_eq!(result.get("Bredd (value)").unwrap(), "60");
        assert_eq!(result.get("H\u{f6}jd (value)").unwrap(), "75");
    }

    #[test]
    fn measurements_last_occurrence_wins_on_repeated_label() {
        let result = parse_measurements("L 10 cm, L 20 cm");
        assert_eq!(result.get("L\u{e4}ngd (value)").unwrap(), "20");
    }

    #[test]
    fn measurements_unrecognized_label_falls_back_to_text() {
        let result = parse_measurements("Vikt 5 kg");
        assert_eq!(result.get("Vikt (value)").unwrap(), "5");
    }

    #[test]
    fn canonical_measurement_label_matches_known_tokens_case_insensitively() {
        assert_eq!(canonical_measurement_label("vikt"), Some("Vikt"));
        assert_eq!(canonical_measurement_label("H\u{f6}jd"), Some("H\u{f6}jd"));
        assert_eq!(canonical_measurement_label("Color"), None);
    }

    #[test]
    fn digits_extraction_strips_non_digits() {
        assert_eq!(extract_only_digits("SKU-0042/A"), "0042");
    }

    #[test]
    fn first_decimal_handles_thousand_separator() {
        assert_eq!(extract_first_decimal("1 234,5 st"), "1234.5");
    }

    #[test]
    fn first_decimal_empty_for_empty_input() {
        assert_eq!(extract_first_decimal(""), "");
    }
}
