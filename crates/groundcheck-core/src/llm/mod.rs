//! External capability traits and HTTP implementations
//!
//! The pipeline never talks to a model or vector store directly; every
//! stage takes these traits so tests can stub them and deployments can
//! swap providers.

mod client;
mod traits;

pub use client::{APIMetrics, HttpLlmClient, MetricsSnapshot};
pub use traits::{ChatMessage, FastLlm, GenerationLlm, VectorSearch};

/// Extract the JSON payload from an LLM response
///
/// Handles markdown code fences and leading/trailing prose by slicing from
/// the first opening delimiter to the last matching closing one. Returns
/// `None` when no JSON-looking span exists.
pub fn extract_json(response: &str) -> Option<&str> {
    let stripped = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
    } else if response.contains("```") {
        response
            .split("```")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
    } else {
        response
    }
    .trim();

    let (open, close) = match stripped.find(['{', '[']) {
        Some(pos) if stripped.as_bytes()[pos] == b'[' => ('[', ']'),
        Some(_) => ('{', '}'),
        None => return None,
    };

    let start = stripped.find(open)?;
    let end = stripped.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&stripped[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_json_fenced() {
        let response = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(response), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_with_prose() {
        let response = "Here is the result:\n{\"a\": 1}\nHope this helps!";
        assert_eq!(extract_json(response), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_array() {
        assert_eq!(extract_json("scores: [8, 3, 5]"), Some("[8, 3, 5]"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
    }
}
