//! HTTP client for external LLM services (vLLM, OpenAI, etc.)

use crate::config::LLMServiceConfig;
use crate::error::{GroundCheckError, Result};
use crate::llm::{ChatMessage, FastLlm, GenerationLlm};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// API metrics for monitoring
#[derive(Debug, Default)]
pub struct APIMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

/// Snapshot of API metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_latency_ms: f64,
}

/// OpenAI-compatible chat client implementing both LLM capabilities
///
/// The fast-LLM surface maps every failure to `None` (the pipeline's
/// degrade contract); the generation surface propagates errors since the
/// corrective loop treats a failed regeneration as a terminal attempt.
#[derive(Debug)]
pub struct HttpLlmClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    metrics: Arc<APIMetrics>,
}

impl HttpLlmClient {
    /// Create new client from configuration
    ///
    /// The base URL must be set; a blank URL would turn every call into a
    /// confusing connection error much later.
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(GroundCheckError::Config(
                "llm_service.url must not be empty".to_string(),
            ));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(GroundCheckError::Http)?;

        Ok(Self {
            http_client,
            config,
            metrics: Arc::new(APIMetrics::default()),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(LLMServiceConfig::default())
    }

    /// Get current API metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.total_requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                self.metrics.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        if messages.is_empty() {
            return Err(GroundCheckError::InvalidInput(
                "chat completion requires at least one message".to_string(),
            ));
        }
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let request = ChatRequest {
            model,
            messages,
            temperature: 0.2,
            max_tokens: 1024,
        };

        let url = format!("{}/v1/chat/completions", self.config.url);

        let mut req = self.http_client.post(&url).json(&request);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(|e| {
            self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
            GroundCheckError::Http(e)
        })?;

        if !response.status().is_success() {
            self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GroundCheckError::ExternalError(format!(
                "LLM service error (HTTP {}): {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
            GroundCheckError::Http(e)
        })?;

        let content = chat_response
            .choices
            .first()
            .ok_or_else(|| {
                self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
                GroundCheckError::Llm("No response from LLM".to_string())
            })?
            .message
            .content
            .clone();

        let elapsed = start.elapsed().as_millis() as u64;
        self.metrics
            .total_latency_ms
            .fetch_add(elapsed, Ordering::Relaxed);

        Ok(content)
    }
}

#[async_trait]
impl FastLlm for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Option<String> {
        let messages = [ChatMessage::user(prompt)];
        match self
            .chat_completion(&self.config.fast_model, &messages)
            .await
        {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!("Fast LLM call failed, degrading: {}", e);
                None
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.fast_model
    }
}

#[async_trait]
impl GenerationLlm for HttpLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat_completion(&self.config.generation_model, messages)
            .await
    }

    fn model_name(&self) -> &str {
        &self.config.generation_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> LLMServiceConfig {
        LLMServiceConfig {
            url: url.to_string(),
            ..LLMServiceConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let err = HttpLlmClient::new(config("  ")).unwrap_err();
        assert!(matches!(err, GroundCheckError::Config(_)));
    }

    #[tokio::test]
    async fn test_generation_rejects_empty_messages() {
        let client = HttpLlmClient::new(config("http://localhost:8000")).unwrap();
        let err = GenerationLlm::complete(&client, &[]).await.unwrap_err();
        assert!(matches!(err, GroundCheckError::InvalidInput(_)));
        // contract failures do not count as service errors
        assert_eq!(client.metrics().total_requests, 0);
    }
}
