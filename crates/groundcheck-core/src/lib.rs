//! Groundcheck Core Library
//!
//! Hybrid retrieval, ranking, and self-verification pipeline for
//! workspace question answering.
//!
//! # Features
//! - Query understanding: normalization, planning, expansion, HyDE probes
//! - In-memory BM25 keyword search over a chunk corpus
//! - Hybrid retrieval with Reciprocal Rank Fusion (RRF)
//! - LLM relevance reranking
//! - Claim-level response verification with confidence scoring
//! - Corrective retrieval loop (CRAG) with a bounded retry budget
//!
//! The embedding store, chunker, and answer generation are external
//! capabilities behind traits in [`llm`]; every stage degrades to a
//! documented fallback when a capability is missing.

pub mod config;
pub mod corpus;
pub mod error;
pub mod llm;
pub mod query;
pub mod search;
pub mod verify;

pub use config::{Capabilities, Config, LLMServiceConfig, RetrievalConfig, VerificationConfig};
pub use corpus::{Chunk, ChunkKey, ChunkMetadata, Workspace};
pub use error::{Error, GroundCheckError, Result};
pub use llm::{
    ChatMessage, FastLlm, GenerationLlm, HttpLlmClient, MetricsSnapshot, VectorSearch,
};
pub use query::{
    detect_document_request, expand_contractions, expand_query, generate_hyde_document,
    plan_query, preprocess_query, AnswerStyle, Complexity, ExpansionResult, PreprocessedQuery,
    QueryPlan, QueryType, RetrievalStrategy,
};
pub use search::{
    rerank_with_llm, CandidateSource, FileContent, HybridRetriever, KeywordIndex,
    ScoredCandidate, SearchOptions,
};
pub use verify::{
    calculate_confidence, verify_and_correct, verify_response, Claim, ClaimStatus, CragResult,
    VerificationResult,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "groundcheck";
