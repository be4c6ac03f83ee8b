//! Fuzzy topic matching shared by open-loop dedup and dismissal.
//!
//! Two topics match if their normalized strings are identical, their
//! singularized token sequences are identical, or their singularized token
//! sets share at least one significant (non-stopword) token. This makes
//! "Holiday Party" match both "holiday parties" and "party tonight".

use std::collections::HashSet;

/// Words too generic to count as topic overlap on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "my", "your", "our", "his", "her", "their", "for", "at", "on", "in", "to",
    "of", "and", "with", "about", "this", "that", "tonight", "tomorrow", "today", "soon",
];

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_topic(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    for c in topic.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic plural stripping: "parties" -> "party", "walks" -> "walk".
/// Words like "dress" keep their trailing "ss".
fn singularize(token: &str) -> String {
    if let Some(stem) = token.strip_suffix("ies") {
        if stem.len() > 1 {
            return format!("{stem}y");
        }
    }
    if token.len() > 1 && token.ends_with('s') && !token.ends_with("ss") {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}

/// Singularized tokens of a normalized topic, in order.
pub fn singular_tokens(topic: &str) -> Vec<String> {
    normalize_topic(topic)
        .split_whitespace()
        .map(singularize)
        .collect()
}

fn is_stopword(token: &str) -> bool {
    token.len() < 2 || STOPWORDS.contains(&token)
}

/// The fuzzy matching rule used for dedup and dismissal.
pub fn topics_match(a: &str, b: &str) -> bool {
    let norm_a = normalize_topic(a);
    let norm_b = normalize_topic(b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return false;
    }
    if norm_a == norm_b {
        return true;
    }

    let tokens_a = singular_tokens(&norm_a);
    let tokens_b = singular_tokens(&norm_b);
    if tokens_a == tokens_b {
        return true;
    }

    let set_a: HashSet<&str> = tokens_a.iter().map(String::as_str).collect();
    tokens_b
        .iter()
        .any(|token| set_a.contains(token.as_str()) && !is_stopword(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_and_punctuation() {
        assert_eq!(normalize_topic("  Holiday  Party!! "), "holiday party");
        assert_eq!(normalize_topic("mom's birthday"), "mom s birthday");
    }

    #[test]
    fn singularize_handles_plurals() {
        assert_eq!(singularize("parties"), "party");
        assert_eq!(singularize("walks"), "walk");
        assert_eq!(singularize("dress"), "dress");
        assert_eq!(singularize("s"), "s");
    }

    #[test]
    fn exact_match_after_normalization() {
        assert!(topics_match("Holiday Party", "holiday party"));
        assert!(topics_match("holiday-party", "Holiday Party!"));
    }

    #[test]
    fn plural_variants_match() {
        assert!(topics_match("Holiday Party", "holiday parties"));
        assert!(topics_match("morning walk", "morning walks"));
    }

    #[test]
    fn shared_significant_word_matches() {
        assert!(topics_match("Holiday Party", "party tonight"));
        assert!(topics_match("job interview", "the interview"));
    }

    #[test]
    fn stopword_only_overlap_does_not_match() {
        assert!(!topics_match("the party", "the meeting"));
        assert!(!topics_match("dinner tonight", "gym tonight"));
    }

    #[test]
    fn unrelated_topics_do_not_match() {
        assert!(!topics_match("dentist appointment", "holiday party"));
    }

    #[test]
    fn empty_topics_never_match() {
        assert!(!topics_match("", ""));
        assert!(!topics_match("  !!  ", "party"));
    }
}
