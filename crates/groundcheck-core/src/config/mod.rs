//! Configuration management

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Verification and corrective-loop tuning
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of the LLM service for chat/completions
    pub url: String,

    /// Model name for fast/cheap completions (planning, expansion, verification)
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model name for response generation (corrective-loop regeneration)
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LLMServiceConfig {
    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("GROUNDCHECK_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            fast_model: default_fast_model(),
            generation_model: default_generation_model(),
            api_key: std::env::var("GROUNDCHECK_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_fast_model() -> String {
    std::env::var("GROUNDCHECK_FAST_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.2-3B-Instruct".to_string())
}

fn default_generation_model() -> String {
    std::env::var("GROUNDCHECK_GENERATION_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Retrieval tuning knobs
///
/// The BM25 and RRF constants are standard defaults; ranking-order tests
/// pin behavior, not exact scores, so these stay tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalization
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// RRF rank constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// Final result count for hybrid search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-probe limit for vector and keyword search
    #[serde(default = "default_probe_limit")]
    pub probe_limit: usize,

    /// Candidates sent to the LLM reranker
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: usize,

    /// Maximum concurrent vector-search probes
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Skip query expansion when the top BM25 hit is a clear winner
    #[serde(default = "default_true")]
    pub strong_signal_skip: bool,

    /// Strong-signal score threshold
    #[serde(default = "default_strong_signal_score")]
    pub strong_signal_score: f64,

    /// Strong-signal gap to the runner-up
    #[serde(default = "default_strong_signal_gap")]
    pub strong_signal_gap: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            rrf_k: default_rrf_k(),
            top_k: default_top_k(),
            probe_limit: default_probe_limit(),
            rerank_top_n: default_rerank_top_n(),
            max_concurrent_probes: default_max_concurrent_probes(),
            strong_signal_skip: true,
            strong_signal_score: default_strong_signal_score(),
            strong_signal_gap: default_strong_signal_gap(),
        }
    }
}

fn default_bm25_k1() -> f64 {
    1.5
}

fn default_bm25_b() -> f64 {
    0.75
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_top_k() -> usize {
    10
}

fn default_probe_limit() -> usize {
    20
}

fn default_rerank_top_n() -> usize {
    10
}

fn default_max_concurrent_probes() -> usize {
    4
}

fn default_strong_signal_score() -> f64 {
    0.85
}

fn default_strong_signal_gap() -> f64 {
    0.15
}

fn default_true() -> bool {
    true
}

/// Verification and corrective-loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Run claim verification on generated responses
    #[serde(default = "default_true")]
    pub enable_verification: bool,

    /// Run the corrective retrieval loop when confidence is low
    #[serde(default = "default_true")]
    pub enable_crag: bool,

    /// Confidence below this triggers correction
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Corrective loop retry budget
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enable_verification: true,
            enable_crag: true,
            confidence_threshold: default_confidence_threshold(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_max_attempts() -> usize {
    2
}

/// Capability-availability flags, resolved once at startup
///
/// Stages consult these flags instead of probing the capability per call;
/// a disabled capability routes straight to the stage's fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capabilities {
    /// Vector-search service reachable for this process
    pub vector_search: bool,

    /// Fast/cheap LLM reachable (planning, expansion, reranking, verification)
    pub fast_llm: bool,

    /// Generation LLM reachable (corrective-loop regeneration)
    pub generation: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            vector_search: true,
            fast_llm: true,
            generation: true,
        }
    }
}

impl Capabilities {
    /// All external capabilities disabled; every stage runs its fallback
    pub fn none() -> Self {
        Self {
            vector_search: false,
            fast_llm: false,
            generation: false,
        }
    }
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }
}
