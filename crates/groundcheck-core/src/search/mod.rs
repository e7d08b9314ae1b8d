//! Retrieval engine module
//!
//! Provides:
//! - In-memory BM25 keyword search
//! - Reciprocal Rank Fusion over ranked candidate lists
//! - Hybrid search combining vector probes with keyword search
//! - LLM reranking of fused candidates

mod bm25;
mod fusion;
mod hybrid;
mod rerank;

pub use bm25::{tokenize, KeywordIndex};
pub use fusion::reciprocal_rank_fusion;
pub use hybrid::{has_strong_signal, FileContent, HybridRetriever};
pub use rerank::rerank_with_llm;

use crate::corpus::{Chunk, ChunkKey};

/// Search options for a single hybrid search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Final result count; `None` uses the configured default
    pub top_k: Option<usize>,
    /// Include the keyword index in the fusion
    pub use_bm25: bool,
    /// Run planning/expansion/HyDE before retrieval
    pub query_understanding: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: None,
            use_bm25: true,
            query_understanding: true,
        }
    }
}

/// A chunk candidate with its retrieval score
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub score: f64,
    pub source: CandidateSource,
    /// Relevance score (0-10) attached by the LLM reranker, if it ran
    pub llm_score: Option<u8>,
}

impl ScoredCandidate {
    pub fn key(&self) -> ChunkKey {
        self.chunk.key()
    }
}

/// Which stage produced a candidate's score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Vector,
    Keyword,
    Fused,
}

/// Common English stop words removed from natural language queries
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "he", "in",
    "is", "it", "its", "of", "on", "that", "the", "to", "was", "will", "with", "does", "do",
    "did", "can", "could", "should", "would", "what", "where", "when", "why", "how", "who",
    "which", "this", "these", "those", "there", "here", "i", "me", "my", "you", "your", "we",
    "our", "am", "not",
];

/// Check a lowercase token against the stop word list
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}
