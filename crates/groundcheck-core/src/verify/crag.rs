//! Corrective retrieval loop (CRAG)
//!
//! When a response fails grounding verification, generate follow-up
//! queries from the unsupported claims, retrieve more context, regenerate,
//! and re-verify, bounded by a retry budget and an optional deadline.

use crate::config::VerificationConfig;
use crate::corpus::{ChunkKey, Workspace};
use crate::llm::{extract_json, ChatMessage, FastLlm, GenerationLlm};
use crate::search::{HybridRetriever, SearchOptions};
use crate::verify::verifier::{verify_response, Claim, ClaimStatus, VerificationResult};
use std::collections::HashSet;
use tokio::time::Instant;

/// Follow-up queries issued per corrective attempt
const MAX_CRAG_QUERIES: usize = 3;

/// Outcome of verification plus optional correction
#[derive(Debug, Clone)]
pub struct CragResult {
    pub final_response: String,
    /// Last achieved confidence; 1.0 when verification was off or unavailable
    pub confidence: f64,
    pub is_grounded: bool,
    /// Corrective loops actually executed
    pub attempts: usize,
    pub verification_history: Vec<VerificationResult>,
    pub crag_used: bool,
    /// True iff any follow-up retrieval returned non-empty results
    pub additional_context_used: bool,
}

impl CragResult {
    fn terminal(response: &str, confidence: f64, is_grounded: bool) -> Self {
        Self {
            final_response: response.to_string(),
            confidence,
            is_grounded,
            attempts: 0,
            verification_history: Vec::new(),
            crag_used: false,
            additional_context_used: false,
        }
    }

    /// Last verification result, if any verification ran
    pub fn verification(&self) -> Option<&VerificationResult> {
        self.verification_history.last()
    }
}

/// Verify a response and correct it if confidence falls short
///
/// Terminal without correction when verification is disabled, unavailable
/// (`None` from the verifier means "cannot verify", not "ungrounded"),
/// already confident, or the corrective loop is disabled. Otherwise loops
/// up to `max_attempts` times: follow-up queries from unsupported claims,
/// additional retrieval, regeneration, re-verification. The deadline is
/// checked before each attempt, never mid-call. Exhausting the budget is
/// not an error; the best-effort result carries the last confidence.
#[allow(clippy::too_many_arguments)]
pub async fn verify_and_correct(
    query: &str,
    response: &str,
    context: &str,
    workspace: &Workspace,
    retriever: &HybridRetriever,
    generation: Option<&dyn GenerationLlm>,
    fast_llm: Option<&dyn FastLlm>,
    config: &VerificationConfig,
    deadline: Option<Instant>,
) -> CragResult {
    if !config.enable_verification {
        return CragResult::terminal(response, 1.0, true);
    }

    let Some(initial) = verify_response(query, response, context, fast_llm).await else {
        tracing::debug!("verification unavailable, passing response through");
        return CragResult::terminal(response, 1.0, true);
    };

    if initial.confidence >= config.confidence_threshold || !config.enable_crag {
        let mut result =
            CragResult::terminal(response, initial.confidence, initial.is_grounded);
        result.verification_history.push(initial);
        return result;
    }

    tracing::info!(
        confidence = initial.confidence,
        threshold = config.confidence_threshold,
        "low confidence, entering corrective loop"
    );

    let mut history = vec![initial];
    let mut current_response = response.to_string();
    let mut combined_context = context.to_string();
    let mut used_chunks: HashSet<ChunkKey> = HashSet::new();
    let mut additional_context_used = false;
    let mut attempts = 0;

    for _ in 0..config.max_attempts {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::warn!(attempts, "corrective loop deadline reached");
                break;
            }
        }
        attempts += 1;

        let unsupported: Vec<Claim> = history
            .last()
            .map(|v| {
                v.claims
                    .iter()
                    .filter(|c| c.status == ClaimStatus::Unsupported)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let followups = generate_crag_queries(&unsupported, fast_llm).await;
        // Follow-up retrieval runs without query understanding: the loop
        // already spends LLM budget on regeneration and re-verification
        let options = SearchOptions {
            query_understanding: false,
            ..SearchOptions::default()
        };

        let mut new_context = String::new();
        for followup in followups.iter().take(MAX_CRAG_QUERIES) {
            let candidates = retriever.hybrid_search(workspace, followup, &options).await;
            for candidate in candidates {
                if used_chunks.insert(candidate.key()) {
                    new_context.push_str(&candidate.chunk.text);
                    new_context.push_str("\n\n");
                }
            }
        }

        if !new_context.is_empty() {
            additional_context_used = true;
            combined_context.push_str("\n\n");
            combined_context.push_str(new_context.trim_end());
        }

        let Some(generator) = generation else {
            tracing::warn!("no generation capability, stopping corrective loop");
            break;
        };
        let regenerated = match regenerate(generator, query, &combined_context).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("regeneration failed, stopping corrective loop: {}", e);
                break;
            }
        };

        let Some(verification) =
            verify_response(query, &regenerated, &combined_context, fast_llm).await
        else {
            tracing::warn!("re-verification unavailable, stopping corrective loop");
            break;
        };

        current_response = regenerated;
        let confident = verification.confidence >= config.confidence_threshold;
        history.push(verification);
        if confident {
            break;
        }
    }

    let (confidence, is_grounded) = history
        .last()
        .map(|v| (v.confidence, v.is_grounded))
        .unwrap_or((0.0, false));
    CragResult {
        final_response: current_response,
        confidence,
        is_grounded,
        attempts,
        verification_history: history,
        crag_used: true,
        additional_context_used,
    }
}

async fn regenerate(
    generator: &dyn GenerationLlm,
    query: &str,
    context: &str,
) -> crate::error::Result<String> {
    let messages = [
        ChatMessage::system(
            "Answer the question using ONLY the provided context. State only facts \
             the context supports; say so when the context does not cover something.",
        ),
        ChatMessage::user(format!("Context:\n{}\n\nQuestion: {}", context, query)),
    ];
    generator.complete(&messages).await
}

/// Build follow-up search queries from unsupported claims
///
/// No unsupported claims means no queries and no LLM call. With claims in
/// hand, ask the fast LLM for targeted queries; when it cannot help, fall
/// back to the first five words of each claim.
pub async fn generate_crag_queries(
    unsupported: &[Claim],
    fast_llm: Option<&dyn FastLlm>,
) -> Vec<String> {
    if unsupported.is_empty() {
        return Vec::new();
    }

    if let Some(llm) = fast_llm {
        let prompt = build_crag_query_prompt(unsupported);
        if let Some(response) = llm.complete(&prompt).await {
            if let Some(queries) = parse_crag_queries(&response) {
                return queries;
            }
            tracing::warn!("CRAG query response unparseable, using claim-prefix fallback");
        }
    }

    unsupported
        .iter()
        .map(|claim| {
            claim
                .text
                .split_whitespace()
                .take(5)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|q| !q.is_empty())
        .collect()
}

fn build_crag_query_prompt(unsupported: &[Claim]) -> String {
    let mut prompt = String::from(
        "These claims from a draft answer lack supporting evidence. Write one \
         short search query per claim to find evidence for or against it.\n\nClaims:\n",
    );
    for (idx, claim) in unsupported.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", idx, claim.text));
    }
    prompt.push_str("\nOutput ONLY a JSON array of query strings:\n");
    prompt
}

fn parse_crag_queries(response: &str) -> Option<Vec<String>> {
    let json_str = extract_json(response)?;
    let queries: Vec<String> = match serde_json::from_str(json_str) {
        Ok(queries) => queries,
        Err(e) => {
            tracing::warn!("Failed to parse CRAG queries JSON: {}", e);
            return None;
        }
    };
    let queries: Vec<String> = queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if queries.is_empty() {
        None
    } else {
        Some(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsupported_claim(text: &str) -> Claim {
        Claim {
            text: text.to_string(),
            status: ClaimStatus::Unsupported,
            evidence: None,
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn test_crag_queries_empty_claims_no_llm_call() {
        struct PanicLlm;
        #[async_trait::async_trait]
        impl FastLlm for PanicLlm {
            async fn complete(&self, _prompt: &str) -> Option<String> {
                panic!("must not be called for an empty claim list");
            }
            fn model_name(&self) -> &str {
                "panic"
            }
        }

        let queries = generate_crag_queries(&[], Some(&PanicLlm)).await;
        assert!(queries.is_empty());
    }

    #[tokio::test]
    async fn test_crag_queries_fallback_first_five_words() {
        let claims = vec![unsupported_claim(
            "the scheduler runs compaction every six hours at night",
        )];
        let queries = generate_crag_queries(&claims, None).await;
        assert_eq!(queries, vec!["the scheduler runs compaction every"]);
    }

    #[tokio::test]
    async fn test_crag_queries_from_llm() {
        struct FixedLlm;
        #[async_trait::async_trait]
        impl FastLlm for FixedLlm {
            async fn complete(&self, _prompt: &str) -> Option<String> {
                Some(r#"["scheduler compaction interval", "compaction schedule"]"#.to_string())
            }
            fn model_name(&self) -> &str {
                "fixed"
            }
        }

        let claims = vec![unsupported_claim("the scheduler runs compaction")];
        let queries = generate_crag_queries(&claims, Some(&FixedLlm)).await;
        assert_eq!(
            queries,
            vec!["scheduler compaction interval", "compaction schedule"]
        );
    }
}
