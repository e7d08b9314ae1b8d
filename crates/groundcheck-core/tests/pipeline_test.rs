//! Integration tests for the retrieval and verification pipeline
//!
//! External capabilities are stubbed so tests exercise the real
//! orchestration: fusion, deduplication, degradation, and the corrective
//! loop.

use async_trait::async_trait;
use groundcheck_core::{
    plan_query, verify_and_correct, Capabilities, ChatMessage, Chunk, ChunkMetadata, FastLlm,
    GenerationLlm, HybridRetriever, QueryType, RetrievalConfig, SearchOptions, VectorSearch,
    VerificationConfig, Workspace,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn chunk(filename: &str, idx: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("{filename}:{idx}"),
        text: text.to_string(),
        tokens: text.split_whitespace().count(),
        metadata: ChunkMetadata {
            source_file: format!("/docs/{filename}"),
            filename: filename.to_string(),
            category: None,
            chunk_index: idx,
            total_chunks: 4,
            char_start: idx * 200,
            char_end: idx * 200 + text.len(),
            title: None,
        },
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("deploy.md", 0, "the deploy pipeline builds images then runs smoke tests"),
        chunk("deploy.md", 1, "rollback is automatic when smoke tests fail twice"),
        chunk("billing.md", 0, "invoices are generated nightly by the billing scheduler"),
        chunk("billing.md", 1, "failed charges retry three times with exponential backoff"),
        chunk("oncall.md", 0, "page the secondary when the primary does not ack in five minutes"),
    ]
}

fn workspace() -> Workspace {
    Workspace::new("testspace", corpus(), &RetrievalConfig::default())
}

/// Vector search ranking chunks by shared lowercase token count
struct TokenOverlapVectors {
    chunks: Vec<Chunk>,
}

#[async_trait]
impl VectorSearch for TokenOverlapVectors {
    async fn search(
        &self,
        _workspace: &str,
        query: &str,
        limit: usize,
    ) -> groundcheck_core::Result<Vec<(Chunk, f64)>> {
        let query_tokens: HashSet<String> =
            query.to_lowercase().split_whitespace().map(String::from).collect();
        let mut scored: Vec<(Chunk, f64)> = self
            .chunks
            .iter()
            .map(|c| {
                let overlap = c
                    .text
                    .split_whitespace()
                    .filter(|t| query_tokens.contains(&t.to_lowercase()))
                    .count();
                (c.clone(), overlap as f64)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Fast LLM that always reports unavailability
struct UnavailableLlm;

#[async_trait]
impl FastLlm for UnavailableLlm {
    async fn complete(&self, _prompt: &str) -> Option<String> {
        None
    }
    fn model_name(&self) -> &str {
        "unavailable"
    }
}

/// Fast LLM replaying a scripted queue of responses
struct ScriptedLlm {
    responses: Mutex<Vec<Option<String>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Option<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl FastLlm for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Option<String> {
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            None
        } else {
            queue.remove(0)
        }
    }
    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct FixedGenerator(String);

#[async_trait]
impl GenerationLlm for FixedGenerator {
    async fn complete(&self, _messages: &[ChatMessage]) -> groundcheck_core::Result<String> {
        Ok(self.0.clone())
    }
    fn model_name(&self) -> &str {
        "fixed-generator"
    }
}

fn retriever_with_vectors() -> HybridRetriever {
    HybridRetriever::new(RetrievalConfig::default(), Capabilities::default())
        .with_vector_search(Arc::new(TokenOverlapVectors { chunks: corpus() }))
}

#[tokio::test]
async fn test_hybrid_search_no_duplicate_identities() {
    init_tracing();
    let ws = workspace();
    let retriever = retriever_with_vectors();

    let results = retriever
        .hybrid_search(&ws, "smoke tests rollback", &SearchOptions::default())
        .await;

    assert!(!results.is_empty());
    let keys: HashSet<_> = results.iter().map(|c| c.key()).collect();
    assert_eq!(keys.len(), results.len(), "duplicate (filename, char_start)");
}

#[tokio::test]
async fn test_hybrid_search_promotes_agreement() {
    let ws = workspace();
    let retriever = retriever_with_vectors();

    // both keyword and vector search should agree on the rollback chunk
    let results = retriever
        .hybrid_search(&ws, "rollback smoke tests", &SearchOptions::default())
        .await;

    assert_eq!(results[0].chunk.metadata.filename, "deploy.md");
    assert_eq!(results[0].chunk.metadata.chunk_index, 1);
}

#[tokio::test]
async fn test_hybrid_search_degrades_without_vector_capability() {
    let ws = workspace();
    // capability flag off even though no handle is attached either
    let retriever = HybridRetriever::new(
        RetrievalConfig::default(),
        Capabilities {
            vector_search: false,
            fast_llm: false,
            generation: false,
        },
    );

    let results = retriever
        .hybrid_search(&ws, "billing scheduler invoices", &SearchOptions::default())
        .await;

    assert!(!results.is_empty(), "keyword-only degradation failed");
    assert_eq!(results[0].chunk.metadata.filename, "billing.md");
}

#[tokio::test]
async fn test_hybrid_search_vector_only_when_bm25_disabled() {
    let ws = workspace();
    let retriever = retriever_with_vectors();

    let options = SearchOptions {
        use_bm25: false,
        ..SearchOptions::default()
    };
    let results = retriever
        .hybrid_search(&ws, "exponential backoff retry", &options)
        .await;

    assert!(!results.is_empty());
    assert_eq!(results[0].chunk.metadata.filename, "billing.md");
}

#[tokio::test]
async fn test_hybrid_search_empty_when_nothing_available() {
    let ws = Workspace::new("empty", Vec::new(), &RetrievalConfig::default());
    let retriever = HybridRetriever::new(RetrievalConfig::default(), Capabilities::none());

    let results = retriever
        .hybrid_search(&ws, "anything", &SearchOptions::default())
        .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_hybrid_search_respects_top_k() {
    let ws = workspace();
    let retriever = retriever_with_vectors();

    let options = SearchOptions {
        top_k: Some(2),
        ..SearchOptions::default()
    };
    let results = retriever
        .hybrid_search(&ws, "tests billing deploy scheduler", &options)
        .await;
    assert!(results.len() <= 2);
}

#[tokio::test]
async fn test_plan_query_stubbed_none_falls_back() {
    let llm = UnavailableLlm;
    let plan = plan_query("show me my biography", Some(&llm)).await;
    assert_eq!(plan.query_type, QueryType::DocumentLookup);
    assert!(!plan.used_llm);
}

#[tokio::test]
async fn test_verification_disabled_is_terminal() {
    let ws = workspace();
    let retriever = retriever_with_vectors();
    let config = VerificationConfig {
        enable_verification: false,
        ..VerificationConfig::default()
    };

    let result = verify_and_correct(
        "how does rollback work",
        "rollback happens instantly",
        "some context",
        &ws,
        &retriever,
        None,
        Some(&UnavailableLlm),
        &config,
        None,
    )
    .await;

    assert_eq!(result.confidence, 1.0);
    assert!(result.is_grounded);
    assert!(!result.crag_used);
    assert_eq!(result.attempts, 0);
    assert!(result.verification_history.is_empty());
}

#[tokio::test]
async fn test_verification_unavailable_passes_through() {
    let ws = workspace();
    let retriever = retriever_with_vectors();

    let result = verify_and_correct(
        "how does rollback work",
        "rollback happens after two failures",
        "rollback is automatic when smoke tests fail twice",
        &ws,
        &retriever,
        None,
        Some(&UnavailableLlm),
        &VerificationConfig::default(),
        None,
    )
    .await;

    assert_eq!(result.confidence, 1.0);
    assert!(!result.crag_used);
}

fn low_confidence_verification() -> String {
    r#"{
        "claims": [
            {"text": "charges retry five times", "status": "UNSUPPORTED", "evidence": null, "reasoning": "context says three"},
            {"text": "invoices are nightly", "status": "SUPPORTED", "evidence": "generated nightly", "reasoning": "stated"}
        ],
        "is_grounded": false,
        "suggested_corrections": ["fix the retry count"]
    }"#
    .to_string()
}

fn high_confidence_verification() -> String {
    r#"{
        "claims": [
            {"text": "charges retry three times", "status": "SUPPORTED", "evidence": "retry three times", "reasoning": "stated"},
            {"text": "invoices are nightly", "status": "SUPPORTED", "evidence": "generated nightly", "reasoning": "stated"}
        ],
        "is_grounded": true,
        "suggested_corrections": []
    }"#
    .to_string()
}

#[tokio::test]
async fn test_confident_response_skips_crag() {
    let ws = workspace();
    let retriever = retriever_with_vectors();
    let llm = ScriptedLlm::new(vec![Some(high_confidence_verification())]);

    let result = verify_and_correct(
        "how do failed charges retry",
        "charges retry three times and invoices are nightly",
        "failed charges retry three times; invoices are generated nightly",
        &ws,
        &retriever,
        None,
        Some(&llm),
        &VerificationConfig::default(),
        None,
    )
    .await;

    assert!(!result.crag_used);
    assert_eq!(result.attempts, 0);
    assert!(result.confidence >= 0.7);
    assert_eq!(result.verification_history.len(), 1);
}

#[tokio::test]
async fn test_corrective_loop_recovers_confidence() {
    init_tracing();
    let ws = workspace();
    let retriever = retriever_with_vectors();
    // scripted calls: initial verification (low), CRAG follow-up queries
    // (unparseable -> claim-prefix fallback), re-verification (high)
    let llm = ScriptedLlm::new(vec![
        Some(low_confidence_verification()),
        Some("no json".to_string()),
        Some(high_confidence_verification()),
    ]);
    let generator = FixedGenerator("charges retry three times with backoff".to_string());
    let config = VerificationConfig {
        confidence_threshold: 0.7,
        max_attempts: 2,
        ..VerificationConfig::default()
    };

    let result = verify_and_correct(
        "how do failed charges retry",
        "charges retry five times",
        "invoices are generated nightly",
        &ws,
        &retriever,
        Some(&generator),
        Some(&llm),
        &config,
        None,
    )
    .await;

    assert!(result.crag_used);
    assert!(result.attempts >= 1 && result.attempts <= 2);
    assert_eq!(result.final_response, "charges retry three times with backoff");
    assert!(result.confidence >= 0.7);
    assert!(result.additional_context_used);
    assert_eq!(result.verification_history.len(), 2);
}

#[tokio::test]
async fn test_corrective_loop_exhausts_budget_without_error() {
    let ws = workspace();
    let retriever = retriever_with_vectors();
    // every verification stays low; the loop must stop at max_attempts
    let llm = ScriptedLlm::new(vec![
        Some(low_confidence_verification()),
        Some("no json".to_string()),
        Some(low_confidence_verification()),
        Some("no json".to_string()),
        Some(low_confidence_verification()),
    ]);
    let generator = FixedGenerator("still the wrong retry count".to_string());
    let config = VerificationConfig {
        confidence_threshold: 0.9,
        max_attempts: 2,
        ..VerificationConfig::default()
    };

    let result = verify_and_correct(
        "how do failed charges retry",
        "charges retry five times",
        "invoices are generated nightly",
        &ws,
        &retriever,
        Some(&generator),
        Some(&llm),
        &config,
        None,
    )
    .await;

    assert!(result.crag_used);
    assert_eq!(result.attempts, 2);
    assert!(result.confidence < 0.9);
    assert_eq!(result.verification_history.len(), 3);
}

#[tokio::test]
async fn test_corrective_loop_stops_on_expired_deadline() {
    let ws = workspace();
    let retriever = retriever_with_vectors();
    // low confidence would normally trigger correction, but the deadline
    // has already passed when the first attempt is due
    let llm = ScriptedLlm::new(vec![Some(low_confidence_verification())]);
    let generator = FixedGenerator("never generated".to_string());
    let expired = tokio::time::Instant::now() - std::time::Duration::from_millis(1);

    let result = verify_and_correct(
        "how do failed charges retry",
        "charges retry five times",
        "invoices are generated nightly",
        &ws,
        &retriever,
        Some(&generator),
        Some(&llm),
        &VerificationConfig::default(),
        Some(expired),
    )
    .await;

    assert!(result.crag_used);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.final_response, "charges retry five times");
    assert_eq!(result.verification_history.len(), 1);
    assert!(!result.additional_context_used);
}
