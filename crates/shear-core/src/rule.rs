//! Rule-based institution-code extraction.
//!
//! First line of defense: scan the fixed top-left rectangle for a 3-letter
//! uppercase token that survives the blacklist. Zero latency, high
//! precision when the document family keeps its code in the corner box.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::blacklist::Blacklist;

/// Maximal runs of exactly three uppercase letters bounded by word edges.
static CODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{3}\b").expect("code token pattern is valid"));

/// Extract an institution code from the corner-region text.
///
/// Normalizes to uppercase with line breaks collapsed to spaces, then
/// returns the first candidate in scan order that survives the blacklist.
/// `None` is an explicit abstention; this function never guesses.
///
/// Deterministic and side-effect-free for a fixed input and blacklist.
pub fn extract_rule(region_text: &str, blacklist: &Blacklist) -> Option<String> {
    let clean = region_text.to_uppercase().replace('\n', " ");

    CODE_TOKEN
        .find_iter(&clean)
        .map(|m| m.as_str())
        .find(|token| !blacklist.contains(token))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_candidate() {
        let blacklist = Blacklist::default_rule();
        assert_eq!(
            extract_rule("RPT 614\nAPO\nAS OF 01/31", &blacklist),
            Some("APO".to_string())
        );
    }

    #[test]
    fn test_first_survivor_wins_with_multiple_candidates() {
        let blacklist = Blacklist::default_rule();
        assert_eq!(
            extract_rule("FPL REPORT FOR WMG", &blacklist),
            Some("FPL".to_string())
        );
    }

    #[test]
    fn test_blacklisted_tokens_never_returned() {
        // A region of nothing but blacklisted tokens abstains.
        let blacklist = Blacklist::default_rule();
        assert_eq!(extract_rule("RPT THE AND USD PDF", &blacklist), None);
    }

    #[test]
    fn test_abstains_on_empty_region() {
        let blacklist = Blacklist::default_rule();
        assert_eq!(extract_rule("", &blacklist), None);
        assert_eq!(extract_rule("   \n  ", &blacklist), None);
    }

    #[test]
    fn test_lowercase_input_normalized() {
        let blacklist = Blacklist::default_rule();
        assert_eq!(
            extract_rule("ofs statement", &blacklist),
            Some("OFS".to_string())
        );
    }

    #[test]
    fn test_longer_runs_are_not_codes() {
        let blacklist = Blacklist::default_rule();
        assert_eq!(extract_rule("ABCD EF 12G", &blacklist), None);
    }

    #[test]
    fn test_word_edges_respected() {
        let blacklist = Blacklist::default_rule();
        // WHK123 has no word edge after the third letter.
        assert_eq!(extract_rule("WHK123 ACCOUNT", &blacklist), None);
    }

    #[test]
    fn test_deterministic_for_fixed_input() {
        // Repeated extraction returns the same value.
        let blacklist = Blacklist::default_rule();
        let text = "RPT 615 WCL MF AS OF DATE";
        let first = extract_rule(text, &blacklist);
        for _ in 0..10 {
            assert_eq!(extract_rule(text, &blacklist), first);
        }
        assert_eq!(first, Some("WCL".to_string()));
    }
}
