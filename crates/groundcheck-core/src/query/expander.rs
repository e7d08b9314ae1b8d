//! Query expansion for multi-probe retrieval

use crate::llm::{extract_json, FastLlm};
use crate::query::preprocess::PreprocessedQuery;
use serde::Deserialize;
use std::collections::HashSet;

/// Alternative phrasings and extracted entities for a query
#[derive(Debug, Clone)]
pub struct ExpansionResult {
    /// Distinct query variants, processed query always first; at least 2
    /// whenever a distinct variant exists
    pub queries: Vec<String>,
    pub key_entities: Vec<String>,
    pub filename_patterns: Vec<String>,
    pub used_llm: bool,
}

#[derive(Debug, Deserialize)]
struct ExpansionResponse {
    queries: Vec<String>,
    #[serde(default)]
    key_entities: Vec<String>,
    #[serde(default)]
    filename_patterns: Vec<String>,
}

/// Expand a query into alternative phrasings
///
/// The processed query is always present and variants are unique, whether
/// the LLM cooperated or not. A duplicated probe would count the same list
/// twice during fusion, so membership is checked, not just adjacency.
pub async fn expand_query(
    preprocessed: &PreprocessedQuery,
    fast_llm: Option<&dyn FastLlm>,
) -> ExpansionResult {
    if let Some(llm) = fast_llm {
        let prompt = build_expansion_prompt(&preprocessed.processed_query);
        if let Some(response) = llm.complete(&prompt).await {
            if let Some(expansion) = parse_expansion_response(&response, preprocessed) {
                return expansion;
            }
            tracing::warn!("Expansion response unparseable, using fallback");
        }
    }

    fallback_expansion(preprocessed)
}

fn build_expansion_prompt(query: &str) -> String {
    format!(
        r#"Expand this search query to improve recall:

Query: "{}"

Generate 5-7 semantically equivalent reformulations, plus the key entities
and any likely filename fragments.

Example:

Input: "how do I rotate the api keys"
Output: {{
  "queries": ["rotating api keys", "api key rotation procedure", "how to replace api credentials", "renewing access keys", "api key rollover steps"],
  "key_entities": ["api keys", "rotation"],
  "filename_patterns": ["api-keys", "credentials"]
}}

Output JSON with:
- queries: array of 5-7 reformulations
- key_entities: array of strings
- filename_patterns: array of strings, [] if none

Now expand the query above. Output only JSON:"#,
        query
    )
}

fn parse_expansion_response(
    response: &str,
    preprocessed: &PreprocessedQuery,
) -> Option<ExpansionResult> {
    let json_str = extract_json(response)?;

    let parsed: ExpansionResponse = match serde_json::from_str(json_str) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Failed to parse expansion JSON: {}", e);
            tracing::debug!("Raw LLM response: {}", response);
            return None;
        }
    };

    let mut queries: Vec<String> = parsed
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if queries.is_empty() {
        return None;
    }

    // The processed query is always a probe, regardless of what the model returned
    if !queries.iter().any(|q| q == &preprocessed.processed_query) {
        queries.insert(0, preprocessed.processed_query.clone());
    }
    if queries.len() < 2 {
        queries.extend(fallback_variants(preprocessed));
    }
    dedup_queries(&mut queries);

    Some(ExpansionResult {
        queries,
        key_entities: parsed.key_entities,
        filename_patterns: parsed.filename_patterns,
        used_llm: true,
    })
}

/// Expansion built purely from preprocessing output
fn fallback_expansion(preprocessed: &PreprocessedQuery) -> ExpansionResult {
    let mut queries = vec![preprocessed.processed_query.clone()];
    queries.extend(fallback_variants(preprocessed));
    queries.push(preprocessed.original_query.to_lowercase());
    dedup_queries(&mut queries);

    ExpansionResult {
        queries,
        key_entities: preprocessed.search_terms.clone(),
        filename_patterns: preprocessed.document_hint.clone().into_iter().collect(),
        used_llm: false,
    }
}

fn dedup_queries(queries: &mut Vec<String>) {
    let mut seen = HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
}

fn fallback_variants(preprocessed: &PreprocessedQuery) -> Vec<String> {
    let mut variants = Vec::new();
    if let Some(ref hint) = preprocessed.document_hint {
        if hint != &preprocessed.processed_query {
            variants.push(hint.clone());
        }
    }
    let terms = preprocessed.search_terms.join(" ");
    if !terms.is_empty() && terms != preprocessed.processed_query {
        variants.push(terms);
    }
    variants
}
