//! LLM relevance reranking of fused candidates

use crate::llm::{extract_json, FastLlm};
use crate::search::ScoredCandidate;

/// Maximum characters of candidate text sent per document
const RERANK_TEXT_LIMIT: usize = 400;

/// Rerank the top candidates with LLM relevance scores
///
/// Sends the first `top_n` candidates' text with a prompt requesting a
/// positional JSON array of 0-10 integer scores, attaches `llm_score`, and
/// stable-sorts scored candidates above unscored ones. Scoring failure is a
/// no-op: the fused order comes back untouched with every `llm_score` left
/// `None`.
pub async fn rerank_with_llm(
    query: &str,
    mut candidates: Vec<ScoredCandidate>,
    top_n: usize,
    fast_llm: Option<&dyn FastLlm>,
) -> Vec<ScoredCandidate> {
    if candidates.is_empty() || top_n == 0 {
        return candidates;
    }
    let Some(llm) = fast_llm else {
        return candidates;
    };

    let n = top_n.min(candidates.len());
    let prompt = build_rerank_prompt(query, &candidates[..n]);

    let Some(response) = llm.complete(&prompt).await else {
        return candidates;
    };
    let Some(scores) = parse_rerank_response(&response, n) else {
        tracing::warn!("Rerank response unparseable, keeping fused order");
        return candidates;
    };

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.llm_score = Some(score);
    }

    // stable: equal scores and the unscored tail keep their fused order
    candidates.sort_by(|a, b| match (a.llm_score, b.llm_score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    candidates
}

fn build_rerank_prompt(query: &str, candidates: &[ScoredCandidate]) -> String {
    let mut prompt = format!(
        "Score each passage's relevance to the query, 0 (irrelevant) to 10 (answers it directly).\n\nQuery: \"{}\"\n\nPassages:\n",
        query
    );

    for (idx, candidate) in candidates.iter().enumerate() {
        let text: String = candidate.chunk.text.chars().take(RERANK_TEXT_LIMIT).collect();
        prompt.push_str(&format!("[{}] {}\n", idx, text));
    }

    prompt.push_str(
        "\nOutput ONLY a JSON array of integer scores aligned to passage order, e.g. [7, 0, 9]:\n",
    );
    prompt
}

/// Parse the positional score array; `None` unless every position parses
fn parse_rerank_response(response: &str, expected: usize) -> Option<Vec<u8>> {
    let json_str = extract_json(response)?;

    let values: Vec<serde_json::Value> = match serde_json::from_str(json_str) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Failed to parse rerank JSON: {}", e);
            tracing::debug!("Raw LLM response: {}", response);
            return None;
        }
    };

    if values.len() < expected {
        tracing::warn!(
            got = values.len(),
            expected,
            "rerank score array too short"
        );
        return None;
    }

    values
        .into_iter()
        .take(expected)
        .map(|v| v.as_u64().map(|s| s.min(10) as u8))
        .collect()
}
