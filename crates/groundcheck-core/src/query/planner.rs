//! LLM-assisted query planning with heuristic fallback

use crate::llm::{extract_json, FastLlm};
use crate::query::preprocess::detect_document_request;
use serde::{Deserialize, Serialize};

/// Query classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    DocumentLookup,
    FactualQa,
    Procedural,
    MultiStep,
}

/// How to retrieve context for the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    FullDocument,
    SemanticChunks,
    Hybrid,
}

/// Whether to return content verbatim or synthesize an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    ReturnContent,
    Synthesize,
}

/// Estimated query complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Retrieval plan for a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query_type: QueryType,
    pub retrieval_strategy: RetrievalStrategy,
    pub filename_hints: Vec<String>,
    pub answer_style: AnswerStyle,
    pub complexity: Complexity,
    pub used_llm: bool,
}

/// Strict schema for the LLM's plan JSON; any mismatch routes to the
/// heuristic rather than partial acceptance.
#[derive(Debug, Deserialize)]
struct PlanResponse {
    query_type: QueryType,
    retrieval_strategy: RetrievalStrategy,
    #[serde(default)]
    filename_hints: Vec<String>,
    answer_style: AnswerStyle,
    complexity: Complexity,
}

/// Plan how to retrieve context for a query
///
/// Never fails: malformed or missing LLM output degrades to the
/// document-request heuristic.
pub async fn plan_query(query: &str, fast_llm: Option<&dyn FastLlm>) -> QueryPlan {
    if let Some(llm) = fast_llm {
        let prompt = build_plan_prompt(query);
        if let Some(response) = llm.complete(&prompt).await {
            if let Some(plan) = parse_plan_response(&response) {
                return plan;
            }
            tracing::warn!("Query plan response unparseable, using heuristic");
        }
    }

    heuristic_plan(query)
}

fn build_plan_prompt(query: &str) -> String {
    format!(
        r#"Classify this search query and plan retrieval.

Query: "{}"

Fields:
- query_type: "document_lookup" (user wants a specific document), "factual_qa" (a factual question), "procedural" (how-to steps), or "multi_step" (needs several lookups)
- retrieval_strategy: "full_document", "semantic_chunks", or "hybrid"
- filename_hints: array of likely filename fragments, [] if none
- answer_style: "return_content" (show the document) or "synthesize" (compose an answer)
- complexity: "simple", "moderate", or "complex"

Output ONLY this JSON (no markdown, no explanation):
{{
  "query_type": "...",
  "retrieval_strategy": "...",
  "filename_hints": [],
  "answer_style": "...",
  "complexity": "..."
}}"#,
        query
    )
}

fn parse_plan_response(response: &str) -> Option<QueryPlan> {
    let json_str = extract_json(response)?;

    match serde_json::from_str::<PlanResponse>(json_str) {
        Ok(parsed) => Some(QueryPlan {
            query_type: parsed.query_type,
            retrieval_strategy: parsed.retrieval_strategy,
            filename_hints: parsed.filename_hints,
            answer_style: parsed.answer_style,
            complexity: parsed.complexity,
            used_llm: true,
        }),
        Err(e) => {
            tracing::warn!("Failed to parse plan JSON: {}", e);
            tracing::debug!("Raw LLM response: {}", response);
            None
        }
    }
}

/// Heuristic fallback when the LLM is unavailable or its output is unusable
pub fn heuristic_plan(query: &str) -> QueryPlan {
    let (is_doc_request, hint) = detect_document_request(query);

    if is_doc_request {
        QueryPlan {
            query_type: QueryType::DocumentLookup,
            retrieval_strategy: RetrievalStrategy::FullDocument,
            filename_hints: hint.into_iter().collect(),
            answer_style: AnswerStyle::ReturnContent,
            complexity: Complexity::Simple,
            used_llm: false,
        }
    } else {
        QueryPlan {
            query_type: QueryType::FactualQa,
            retrieval_strategy: RetrievalStrategy::SemanticChunks,
            filename_hints: Vec::new(),
            answer_style: AnswerStyle::Synthesize,
            complexity: Complexity::Simple,
            used_llm: false,
        }
    }
}
