//! Hypothetical document generation (HyDE)
//!
//! A synthetic answer passage embeds closer to relevant chunks than the
//! question itself, so it serves as one extra vector-search probe.

use crate::llm::FastLlm;
use crate::query::planner::{QueryPlan, QueryType};

/// Generate a hypothetical passage answering the query
///
/// Returns `None` on any failure; the caller skips the probe and never
/// retries. Document-lookup plans skip generation entirely: a synthetic
/// passage cannot help full-document retrieval and wastes an LLM call.
pub async fn generate_hyde_document(
    query: &str,
    plan: Option<&QueryPlan>,
    fast_llm: Option<&dyn FastLlm>,
) -> Option<String> {
    if let Some(plan) = plan {
        if plan.query_type == QueryType::DocumentLookup {
            tracing::debug!("Skipping HyDE for document lookup");
            return None;
        }
    }

    let llm = fast_llm?;
    let prompt = build_hyde_prompt(query);
    let response = llm.complete(&prompt).await?;

    let passage = response.trim();
    if passage.is_empty() {
        return None;
    }
    Some(passage.to_string())
}

fn build_hyde_prompt(query: &str) -> String {
    format!(
        r#"Write a short passage (3-5 sentences) that would appear in a document
answering this question. Write it as if it came from real documentation,
with concrete details. Do not mention the question. Output only the passage.

Question: "{}"

Passage:"#,
        query
    )
}
