//! Query normalization and document-request detection

use crate::search::is_stop_word;
use lazy_static::lazy_static;
use regex::Regex;

/// Contraction dictionary applied after lowercasing
///
/// Expansions contain no contractions themselves, so a second pass is a
/// no-op (idempotency is relied on by callers that re-process text).
const CONTRACTIONS: &[(&str, &str)] = &[
    ("what's", "what is"),
    ("whats", "what is"),
    ("where's", "where is"),
    ("who's", "who is"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("it's", "it is"),
    ("he's", "he is"),
    ("she's", "she is"),
    ("let's", "let us"),
    ("i'm", "i am"),
    ("i've", "i have"),
    ("i'll", "i will"),
    ("i'd", "i would"),
    ("you're", "you are"),
    ("you've", "you have"),
    ("you'll", "you will"),
    ("we're", "we are"),
    ("we've", "we have"),
    ("we'll", "we will"),
    ("they're", "they are"),
    ("they've", "they have"),
    ("can't", "cannot"),
    ("won't", "will not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("haven't", "have not"),
    ("hasn't", "has not"),
    ("hadn't", "had not"),
    ("couldn't", "could not"),
    ("shouldn't", "should not"),
    ("wouldn't", "would not"),
];

/// Verbs that trigger document-request detection; dropped from search terms
const TRIGGER_VERBS: &[&str] = &["show", "display", "get", "open", "read", "use"];

/// Articles and possessives stripped from a captured document hint
const HINT_NOISE: &[&str] = &["the", "a", "an", "my", "our", "your", "me", "that", "this"];

lazy_static! {
    static ref CONTRACTION_PATTERNS: Vec<(Regex, &'static str)> = CONTRACTIONS
        .iter()
        .map(|(from, to)| {
            let pattern = format!(r"\b{}\b", regex::escape(from));
            // table entries are valid literal patterns
            (Regex::new(&pattern).expect("contraction pattern"), *to)
        })
        .collect();

    /// Surface patterns for document-lookup requests, matched against the
    /// contraction-expanded query. The capture is the candidate hint.
    static ref DOC_REQUEST_PATTERNS: Vec<Regex> = [
        r"show me (.+)",
        r"what is in (.+)",
        r"what is inside (.+)",
        r"display (.+)",
        r"get me (.+)",
        r"\b(?:read|open) (?:the |my |our |your )?(.+)",
        r"\buse (?:the |my |our |your )?(.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("document request pattern"))
    .collect();
}

/// Result of query preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessedQuery {
    pub original_query: String,
    pub processed_query: String,
    pub is_document_request: bool,
    pub document_hint: Option<String>,
    pub search_terms: Vec<String>,
}

/// Lowercase text and expand a fixed dictionary of contractions
///
/// Non-contraction text passes through unchanged apart from lowercasing.
pub fn expand_contractions(text: &str) -> String {
    let mut result = text.to_lowercase();
    for (pattern, replacement) in CONTRACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }
    result
}

/// Detect whether a query asks for a document rather than an answer
///
/// Matches fixed surface patterns against the contraction-expanded text and
/// returns the captured noun phrase, stripped of articles and possessives.
pub fn detect_document_request(text: &str) -> (bool, Option<String>) {
    let expanded = expand_contractions(text);

    for pattern in DOC_REQUEST_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&expanded) {
            if let Some(phrase) = captures.get(1) {
                let hint = clean_hint(phrase.as_str());
                if !hint.is_empty() {
                    return (true, Some(hint));
                }
            }
        }
    }

    (false, None)
}

fn clean_hint(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|tok| tok.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|tok| !tok.is_empty() && !HINT_NOISE.contains(tok))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full preprocessing pass: normalize, classify, extract search terms
pub fn preprocess_query(text: &str) -> PreprocessedQuery {
    let processed = expand_contractions(text);
    let (is_document_request, document_hint) = detect_document_request(text);

    let search_terms: Vec<String> = processed
        .split_whitespace()
        .map(|tok| {
            tok.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|tok| {
            !tok.is_empty() && !is_stop_word(tok.as_str()) && !TRIGGER_VERBS.contains(&tok.as_str())
        })
        .collect();

    PreprocessedQuery {
        original_query: text.to_string(),
        processed_query: processed,
        is_document_request,
        document_hint,
        search_terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_contractions_basic() {
        assert_eq!(expand_contractions("What's in my notes?"), "what is in my notes?");
        assert_eq!(expand_contractions("I can't open it"), "i cannot open it");
        assert_eq!(expand_contractions("I'm looking for docs"), "i am looking for docs");
    }

    #[test]
    fn test_expand_contractions_passthrough() {
        assert_eq!(expand_contractions("Plain Query Text"), "plain query text");
    }

    #[test]
    fn test_expand_contractions_idempotent() {
        let inputs = [
            "What's in my biography?",
            "can't won't don't",
            "no contractions at all",
        ];
        for input in inputs {
            let once = expand_contractions(input);
            let twice = expand_contractions(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_detect_document_request_positive() {
        let (is_req, hint) = detect_document_request("show me my biography");
        assert!(is_req);
        assert_eq!(hint.as_deref(), Some("biography"));

        let (is_req, hint) = detect_document_request("What's in the deploy runbook?");
        assert!(is_req);
        assert_eq!(hint.as_deref(), Some("deploy runbook"));

        let (is_req, hint) = detect_document_request("open my meeting notes");
        assert!(is_req);
        assert_eq!(hint.as_deref(), Some("meeting notes"));
    }

    #[test]
    fn test_detect_document_request_negative() {
        assert_eq!(detect_document_request("How do I write a blog post?"), (false, None));
        assert_eq!(detect_document_request("rust borrow checker"), (false, None));
    }

    #[test]
    fn test_preprocess_query_search_terms() {
        let result = preprocess_query("Show me my biography");
        assert!(result.is_document_request);
        assert_eq!(result.document_hint.as_deref(), Some("biography"));
        assert_eq!(result.search_terms, vec!["biography"]);
        assert_eq!(result.processed_query, "show me my biography");
        assert_eq!(result.original_query, "Show me my biography");
    }

    #[test]
    fn test_preprocess_query_general_question() {
        let result = preprocess_query("How does the billing pipeline retry failures?");
        assert!(!result.is_document_request);
        assert!(result.document_hint.is_none());
        assert_eq!(
            result.search_terms,
            vec!["billing", "pipeline", "retry", "failures"]
        );
    }
}
