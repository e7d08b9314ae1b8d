//! Claim-level response verification

use crate::llm::{extract_json, FastLlm};
use serde::{Deserialize, Serialize};

/// Support status of a single claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Supported,
    PartiallySupported,
    Unsupported,
}

/// An atomic factual assertion extracted from a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub status: ClaimStatus,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Result of verifying a response against retrieved context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Overall confidence, clamped to [0, 1]
    pub confidence: f64,
    pub is_grounded: bool,
    pub claims: Vec<Claim>,
    pub suggested_corrections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    claims: Vec<Claim>,
    #[serde(default)]
    is_grounded: Option<bool>,
    #[serde(default)]
    suggested_corrections: Vec<String>,
}

/// Compute overall confidence from claim statuses
///
/// Supported claims count 1.0, partially supported 0.5, over the claim
/// count; a +0.1 bonus applies when nothing is unsupported; the result is
/// clamped to [0, 1]. An empty claim list is fully confident: there is
/// nothing to contradict.
pub fn calculate_confidence(claims: &[Claim]) -> f64 {
    if claims.is_empty() {
        return 1.0;
    }

    let supported = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Supported)
        .count() as f64;
    let partial = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::PartiallySupported)
        .count() as f64;
    let any_unsupported = claims.iter().any(|c| c.status == ClaimStatus::Unsupported);

    let mut confidence = (supported + 0.5 * partial) / claims.len() as f64;
    if !any_unsupported {
        confidence += 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

/// Verify a generated response against retrieved context
///
/// Decomposes the response into atomic claims via the fast LLM and checks
/// each against the context. Returns `None` when there is nothing to verify
/// (empty response or context) or when verification is unavailable (no LLM,
/// unusable output). The caller must treat `None` as "verification
/// unavailable", never as "ungrounded".
pub async fn verify_response(
    query: &str,
    response: &str,
    context: &str,
    fast_llm: Option<&dyn FastLlm>,
) -> Option<VerificationResult> {
    if response.trim().is_empty() || context.trim().is_empty() {
        return None;
    }

    let llm = fast_llm?;
    let prompt = build_verification_prompt(query, response, context);
    let llm_response = llm.complete(&prompt).await?;

    parse_verification_response(&llm_response)
}

fn build_verification_prompt(query: &str, response: &str, context: &str) -> String {
    format!(
        r#"Decompose the response into atomic factual claims and check each one
against the context. A claim is SUPPORTED when the context states it,
PARTIALLY_SUPPORTED when the context implies part of it, UNSUPPORTED when
the context says nothing about it or contradicts it.

Question: "{}"

Response to verify:
{}

Context:
{}

Output ONLY this JSON:
{{
  "claims": [
    {{"text": "...", "status": "SUPPORTED" | "PARTIALLY_SUPPORTED" | "UNSUPPORTED", "evidence": "quoted context or null", "reasoning": "one sentence"}}
  ],
  "is_grounded": true | false,
  "suggested_corrections": ["..."]
}}"#,
        query, response, context
    )
}

fn parse_verification_response(response: &str) -> Option<VerificationResult> {
    let json_str = extract_json(response)?;

    let parsed: VerificationResponse = match serde_json::from_str(json_str) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Failed to parse verification JSON: {}", e);
            tracing::debug!("Raw LLM response: {}", response);
            return None;
        }
    };

    // Confidence is recomputed locally so the [0,1] invariant and the
    // empty-claims rule hold no matter what the model reported
    let confidence = calculate_confidence(&parsed.claims);
    let no_unsupported = !parsed
        .claims
        .iter()
        .any(|c| c.status == ClaimStatus::Unsupported);

    Some(VerificationResult {
        confidence,
        is_grounded: parsed.is_grounded.unwrap_or(no_unsupported),
        claims: parsed.claims,
        suggested_corrections: parsed.suggested_corrections,
    })
}
