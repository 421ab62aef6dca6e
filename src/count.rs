//! Count extraction from free-text table cells.
//!
//! Cells carry many ad-hoc conventions ("x3", "(2)", "Total 5 - Police 2",
//! bare trailing numbers, case reference codes). The heuristics below are
//! tried in a fixed order and the first match wins; that ordering is
//! load-bearing and must not be rearranged.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountRule {
    NilToAction,
    XPattern,
    Parentheses,
    Brackets,
    TotalKeyword,
    ReferenceCode,
    Standalone,
    EndNumber,
    Default,
}

impl CountRule {
    pub fn as_str(self) -> &'static str {
        match self {
            CountRule::NilToAction => "nil_to_action",
            CountRule::XPattern => "x_pattern",
            CountRule::Parentheses => "parentheses",
            CountRule::Brackets => "brackets",
            CountRule::TotalKeyword => "total_keyword",
            CountRule::ReferenceCode => "reference_code",
            CountRule::Standalone => "standalone",
            CountRule::EndNumber => "end_number",
            CountRule::Default => "default",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CountExtraction {
    pub count: u32,
    pub rule: CountRule,
    pub matched: Option<String>,
}

static NIL_TO_ACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnil\s+to\s+action\b").unwrap());
static X_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bx(\d{1,3})\b").unwrap());
static PAREN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{1,3})\)").unwrap());
static BRACKET_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,3})\]").unwrap());
static TOTAL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btotal\s+(\d{1,3})\b").unwrap());
static REFERENCE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?i:LAW|MIS|ITOP)\d+|\bS\d+(?:/\d+)?\b").unwrap());
static STANDALONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}$").unwrap());
static END_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})\s*$").unwrap());

// Tokens that mark a nearby parenthesised number as a reference, not a count
// (conviction/offence/charge numbers, CN identifiers, state abbreviations).
static REFERENCE_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:conviction|offence|charge)s?\b|\b(?:CN|ACT|NSW|NT|QLD|SA|TAS|VIC|WA)\d*\b")
        .unwrap()
});

// A trailing number preceded by any of these is part of a code or label,
// not a count.
static END_NUMBER_GUARDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[A-Z]{2,}\d{1,3}\s*$",
        r"S\d+/\d{1,3}\s*$",
        r"/\d{1,3}\s*$",
        r"\bCN\d{1,3}\s*$",
        r"\bI\s+\d{1,3}\s*$",
        r"\d+-\d+-\d{1,3}\s*$",
        r"\d-\d{1,3}\s*$",
        r"(?i)\breminder\s*-\s",
        r"(?i)\bover\s+\d{1,3}\s*$",
        r"(?i)\bpage\s+\d{1,3}\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const REFERENCE_WINDOW: usize = 25;

fn window_before(text: &str, end: usize) -> &str {
    let mut start = end.saturating_sub(REFERENCE_WINDOW);
    while start < end && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..end]
}

/// Extracts a numeric count from a raw cell. Never fails: unrecognised text
/// defaults to a count of 1 with a logged warning, per the ingestion policy
/// that a bad cell must not abort a folder scrape. Counts are not capped
/// here; anomalies are the reducer's concern.
pub fn extract_count(count_text: &str) -> CountExtraction {
    let text = count_text.trim();

    if let Some(m) = NIL_TO_ACTION.find(text) {
        return CountExtraction {
            count: 0,
            rule: CountRule::NilToAction,
            matched: Some(m.as_str().to_string()),
        };
    }

    if let Some(caps) = X_PATTERN.captures(text) {
        if let Ok(n) = caps[1].parse::<u32>() {
            return CountExtraction {
                count: n,
                rule: CountRule::XPattern,
                matched: Some(caps[0].to_string()),
            };
        }
    }

    let mut paren_sum = 0u32;
    let mut paren_matches: Vec<&str> = Vec::new();
    for caps in PAREN_NUMBER.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if REFERENCE_CONTEXT.is_match(window_before(text, whole.start())) {
            continue;
        }
        if let Ok(n) = caps[1].parse::<u32>() {
            paren_sum += n;
            paren_matches.push(whole.as_str());
        }
    }
    if !paren_matches.is_empty() {
        return CountExtraction {
            count: paren_sum,
            rule: CountRule::Parentheses,
            matched: Some(paren_matches.join(" ")),
        };
    }

    let mut bracket_sum = 0u32;
    let mut bracket_matches: Vec<&str> = Vec::new();
    for caps in BRACKET_NUMBER.captures_iter(text) {
        if let Ok(n) = caps[1].parse::<u32>() {
            bracket_sum += n;
            bracket_matches.push(caps.get(0).unwrap().as_str());
        }
    }
    if !bracket_matches.is_empty() {
        return CountExtraction {
            count: bracket_sum,
            rule: CountRule::Brackets,
            matched: Some(bracket_matches.join(" ")),
        };
    }

    if let Some(caps) = TOTAL_KEYWORD.captures(text) {
        if let Ok(n) = caps[1].parse::<u32>() {
            // Only the leading total counts; a "- Police N" sub-count is ignored.
            return CountExtraction {
                count: n,
                rule: CountRule::TotalKeyword,
                matched: Some(caps[0].to_string()),
            };
        }
    }

    if let Some(m) = REFERENCE_CODE.find(text) {
        // Case identifiers stand for a single item each.
        return CountExtraction {
            count: 1,
            rule: CountRule::ReferenceCode,
            matched: Some(m.as_str().to_string()),
        };
    }

    if STANDALONE.is_match(text) {
        if let Ok(n) = text.parse::<u32>() {
            return CountExtraction {
                count: n,
                rule: CountRule::Standalone,
                matched: Some(text.to_string()),
            };
        }
    }

    if let Some(caps) = END_NUMBER.captures(text) {
        let guarded = END_NUMBER_GUARDS.iter().any(|g| g.is_match(text));
        if !guarded {
            if let Ok(n) = caps[1].parse::<u32>() {
                return CountExtraction {
                    count: n,
                    rule: CountRule::EndNumber,
                    matched: Some(caps[1].to_string()),
                };
            }
        }
    }

    warn!(cell = %text, "no recognisable count pattern, defaulting to 1");
    CountExtraction {
        count: 1,
        rule: CountRule::Default,
        matched: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_to_action_is_zero_in_any_casing() {
        for text in ["nil to action", "NIL TO ACTION", "Nil To Action today"] {
            let got = extract_count(text);
            assert_eq!(got.count, 0, "{text}");
            assert_eq!(got.rule, CountRule::NilToAction);
        }
    }

    #[test]
    fn nil_to_action_beats_other_patterns() {
        let got = extract_count("Nil to action x3");
        assert_eq!(got.count, 0);
        assert_eq!(got.rule, CountRule::NilToAction);
    }

    #[test]
    fn x_pattern_reads_the_multiplier() {
        let got = extract_count("x3");
        assert_eq!(got.count, 3);
        assert_eq!(got.rule, CountRule::XPattern);
        assert_eq!(extract_count("reviewed X12").count, 12);
    }

    #[test]
    fn parentheses_sum_rather_than_max() {
        let got = extract_count("(2) (3)");
        assert_eq!(got.count, 5);
        assert_eq!(got.rule, CountRule::Parentheses);
    }

    #[test]
    fn parentheses_near_reference_tokens_are_excluded() {
        let got = extract_count("CN123 (4)");
        assert_ne!(got.rule, CountRule::Parentheses);
        assert_eq!(got.rule, CountRule::Default);
        assert_eq!(got.count, 1);

        let got = extract_count("NSW (3)");
        assert_ne!(got.rule, CountRule::Parentheses);
    }

    #[test]
    fn only_reference_adjacent_parentheses_are_dropped() {
        // The conviction number is skipped; the trailing count still sums.
        let got = extract_count("conviction (12345678) processed (2)");
        assert_eq!(got.rule, CountRule::Parentheses);
        assert_eq!(got.count, 2);
    }

    #[test]
    fn brackets_sum() {
        let got = extract_count("[2] [4]");
        assert_eq!(got.count, 6);
        assert_eq!(got.rule, CountRule::Brackets);
    }

    #[test]
    fn total_keyword_uses_the_leading_total_only() {
        let got = extract_count("Total 5 - Police 2");
        assert_eq!(got.count, 5);
        assert_eq!(got.rule, CountRule::TotalKeyword);
        assert_eq!(extract_count("total 7").count, 7);
    }

    #[test]
    fn reference_codes_default_to_one_item() {
        for text in ["LAW123456", "MIS9921", "ITOP4411", "S123/2", "S88"] {
            let got = extract_count(text);
            assert_eq!(got.count, 1, "{text}");
            assert_eq!(got.rule, CountRule::ReferenceCode);
        }
    }

    #[test]
    fn standalone_digits_are_the_count() {
        let got = extract_count("7");
        assert_eq!(got.count, 7);
        assert_eq!(got.rule, CountRule::Standalone);
        assert_eq!(extract_count("128").count, 128);
    }

    #[test]
    fn trailing_number_is_used_when_not_code_like() {
        let got = extract_count("Correspondence processed 12");
        assert_eq!(got.count, 12);
        assert_eq!(got.rule, CountRule::EndNumber);
    }

    #[test]
    fn code_like_trailing_numbers_fall_through_to_default() {
        for text in [
            "ABC123",
            "lot 5/12",
            "ref/7",
            "CN12",
            "I 4 ",
            "2-3-1",
            "Reminder - follow up 2",
            "Over 90",
            "Page 3",
        ] {
            let got = extract_count(text);
            assert_eq!(got.rule, CountRule::Default, "{text}");
            assert_eq!(got.count, 1, "{text}");
        }
    }

    #[test]
    fn garbage_defaults_to_one() {
        let got = extract_count("no idea what this is");
        assert_eq!(got.count, 1);
        assert_eq!(got.rule, CountRule::Default);
        assert!(got.matched.is_none());
    }
}
