//! External capability trait definitions

use crate::corpus::Chunk;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Fast/cheap LLM capability for planning, expansion, reranking and
/// verification prompts
///
/// `None` means the capability is unavailable or returned unusable output.
/// Implementations must swallow transport errors; callers degrade to their
/// heuristic fallback on `None`, they never retry or raise.
#[async_trait]
pub trait FastLlm: Send + Sync {
    /// Complete a single prompt
    async fn complete(&self, prompt: &str) -> Option<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Generation LLM capability
///
/// Used only by the corrective loop to regenerate a response with augmented
/// context; the primary answer generation lives outside this crate.
#[async_trait]
pub trait GenerationLlm: Send + Sync {
    /// Generate a completion for a message sequence
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Vector-search capability backed by an external embedding store
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Search a workspace's collection by query text
    ///
    /// Higher score = more similar. A workspace without a collection yields
    /// `Ok(vec![])`, never an error.
    async fn search(&self, workspace: &str, query: &str, limit: usize)
        -> Result<Vec<(Chunk, f64)>>;
}
