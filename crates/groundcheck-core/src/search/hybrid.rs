//! Hybrid retrieval: vector probes + keyword search fused with RRF

use crate::config::{Capabilities, RetrievalConfig};
use crate::corpus::{Chunk, Workspace};
use crate::llm::{FastLlm, VectorSearch};
use crate::query::{
    expand_query, generate_hyde_document, plan_query, preprocess_query, QueryPlan,
};
use crate::search::{
    reciprocal_rank_fusion, rerank_with_llm, tokenize, ScoredCandidate, SearchOptions,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// A whole source file returned by document lookup
#[derive(Debug, Clone)]
pub struct FileContent {
    pub content: String,
    pub filename: String,
    pub source_file: String,
}

/// Hybrid retriever over a workspace's corpus and external capabilities
///
/// Holds the capability handles and tuning once so call sites pass only
/// the workspace and query. Missing capabilities degrade each stage, they
/// never fail a search.
pub struct HybridRetriever {
    vector: Option<Arc<dyn VectorSearch>>,
    fast_llm: Option<Arc<dyn FastLlm>>,
    retrieval: RetrievalConfig,
    capabilities: Capabilities,
}

impl HybridRetriever {
    pub fn new(retrieval: RetrievalConfig, capabilities: Capabilities) -> Self {
        Self {
            vector: None,
            fast_llm: None,
            retrieval,
            capabilities,
        }
    }

    pub fn with_vector_search(mut self, vector: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_fast_llm(mut self, fast_llm: Arc<dyn FastLlm>) -> Self {
        self.fast_llm = Some(fast_llm);
        self
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    fn fast_llm(&self) -> Option<&dyn FastLlm> {
        if !self.capabilities.fast_llm {
            return None;
        }
        self.fast_llm.as_deref()
    }

    fn vector_search(&self) -> Option<&Arc<dyn VectorSearch>> {
        if !self.capabilities.vector_search {
            return None;
        }
        self.vector.as_ref()
    }

    /// Run the full hybrid retrieval pipeline for a query
    ///
    /// Preprocess, optionally plan/expand/HyDE, probe vector search per
    /// query variant, run keyword search once, fuse with RRF, dedupe by
    /// chunk identity, truncate to `top_k`. Vector-search outage degrades
    /// to keyword-only; an empty keyword index degrades to vector-only.
    pub async fn hybrid_search(
        &self,
        workspace: &Workspace,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<ScoredCandidate> {
        let top_k = options.top_k.unwrap_or(self.retrieval.top_k);
        let preprocessed = preprocess_query(query);

        // Keyword pass first: it is cheap and feeds the strong-signal check
        let index = workspace.index();
        let keyword_results: Vec<(Chunk, f64)> = if options.use_bm25 && !index.is_empty() {
            index.search(&preprocessed.processed_query, self.retrieval.probe_limit)
        } else {
            Vec::new()
        };

        let mut probes: Vec<String> = vec![preprocessed.processed_query.clone()];

        let skip_expansion = self.retrieval.strong_signal_skip
            && has_strong_signal(
                &keyword_results,
                self.retrieval.strong_signal_score,
                self.retrieval.strong_signal_gap,
            );

        if options.query_understanding && !skip_expansion {
            let llm = self.fast_llm();
            let plan: QueryPlan = plan_query(query, llm).await;
            let expansion = expand_query(&preprocessed, llm).await;
            probes = expansion.queries;
            if let Some(hyde) = generate_hyde_document(query, Some(&plan), llm).await {
                probes.push(hyde);
            }
        } else if skip_expansion {
            tracing::debug!(query, "strong keyword signal, skipping expansion");
        }

        let vector_lists = self.run_vector_probes(workspace.name(), &probes).await;

        if keyword_results.is_empty() && vector_lists.iter().all(|l| l.is_empty()) {
            tracing::warn!(
                workspace = workspace.name(),
                "no retrieval capability produced candidates"
            );
            return Vec::new();
        }

        // Keyword list first, then probes in probe order: this fixes the
        // tie-break ordering regardless of probe completion order
        let mut lists: Vec<Vec<(Chunk, f64)>> = Vec::with_capacity(1 + vector_lists.len());
        if !keyword_results.is_empty() {
            lists.push(keyword_results);
        }
        lists.extend(vector_lists);

        let mut fused = reciprocal_rank_fusion(&lists, self.retrieval.rrf_k);
        fused.truncate(top_k);
        fused
    }

    /// Issue one vector-search probe per query variant, concurrently
    ///
    /// Results come back in probe order; a failed probe logs and yields an
    /// empty list so one flaky call cannot sink the search.
    async fn run_vector_probes(
        &self,
        workspace_name: &str,
        probes: &[String],
    ) -> Vec<Vec<(Chunk, f64)>> {
        let Some(vector) = self.vector_search() else {
            return Vec::new();
        };

        let limit = self.retrieval.probe_limit;
        let concurrency = self.retrieval.max_concurrent_probes.max(1);

        let mut indexed: Vec<(usize, Vec<(Chunk, f64)>)> = stream::iter(probes.iter().enumerate())
            .map(|(idx, probe)| {
                let vector = Arc::clone(vector);
                let workspace_name = workspace_name.to_string();
                let probe = probe.clone();
                async move {
                    match vector.search(&workspace_name, &probe, limit).await {
                        Ok(results) => (idx, results),
                        Err(e) => {
                            tracing::warn!(probe = %probe, "vector probe failed: {}", e);
                            (idx, Vec::new())
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, results)| results).collect()
    }

    /// Rerank fused candidates with the configured fast LLM
    ///
    /// Sends the first `rerank_top_n` candidates for scoring; without the
    /// fast-LLM capability the fused order passes through unchanged.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate>,
    ) -> Vec<ScoredCandidate> {
        rerank_with_llm(
            query,
            candidates,
            self.retrieval.rerank_top_n,
            self.fast_llm(),
        )
        .await
    }

    /// Return an entire source file matched by filename similarity
    ///
    /// Used when the plan calls for `full_document` retrieval; bypasses
    /// chunk ranking entirely. `None` when no file matches any term.
    pub fn full_document_lookup(
        &self,
        workspace: &Workspace,
        filename_hint: Option<&str>,
        search_terms: &[String],
    ) -> Option<FileContent> {
        let mut terms: Vec<String> = Vec::new();
        if let Some(hint) = filename_hint {
            terms.extend(tokenize(hint));
        }
        for term in search_terms {
            let term = term.to_lowercase();
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        if terms.is_empty() {
            return None;
        }

        let mut best: Option<(usize, String, String)> = None;
        for (filename, source_file) in workspace.source_files() {
            let name = filename.to_lowercase();
            let matched = terms.iter().filter(|t| name.contains(t.as_str())).count();
            if matched > 0 && best.as_ref().map_or(true, |(m, _, _)| matched > *m) {
                best = Some((matched, filename, source_file));
            }
        }

        let (_, filename, source_file) = best?;
        let content = workspace.assemble_file(&filename)?;
        Some(FileContent {
            content,
            filename,
            source_file,
        })
    }
}

/// Check whether the top keyword hit is a clear winner
///
/// Scores are squashed into (0, 1) before comparing so the thresholds stay
/// meaningful for unbounded BM25 scores.
pub fn has_strong_signal(results: &[(Chunk, f64)], score_threshold: f64, gap: f64) -> bool {
    let normalize = |s: f64| s / (1.0 + s);
    match results {
        [] => false,
        [(_, top)] => normalize(*top) >= score_threshold,
        [(_, top), (_, second), ..] => {
            let top = normalize(*top);
            let second = normalize(*second);
            top >= score_threshold && (top - second) >= gap
        }
    }
}
